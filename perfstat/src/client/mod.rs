use anyhow::Result;
use nix::unistd::getuid;
use tracing_subscriber::EnvFilter;

pub mod run;

pub fn init_logger() {
    // init logger
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// make sure we are running with root privileges
pub fn ensure_root() -> Result<()> {
    if !getuid().is_root() {
        anyhow::bail!("perfstat must be run with root privileges!");
    }
    Ok(())
}

pub fn bump_memlock_rlimit() -> Result<()> {
    let rlimit = libc::rlimit {
        rlim_cur: 128 << 20,
        rlim_max: 128 << 20,
    };

    if unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlimit) } != 0 {
        anyhow::bail!("Failed to increase rlimit");
    }

    Ok(())
}

#[cfg(feature = "aya")]
pub fn load_bpf(path: &std::path::Path) -> Result<aya::Ebpf> {
    use anyhow::Context;

    let mut bpf = aya::Ebpf::load_file(path).with_context(|| format!("unable to load bpf object {path:?}"))?;
    init_bpf_logger(&mut bpf);
    Ok(bpf)
}

#[cfg(feature = "aya-log")]
fn init_bpf_logger(bpf: &mut aya::Ebpf) {
    if let Err(e) = aya_log::EbpfLogger::init(bpf) {
        tracing::warn!("bpf logger not initialized: {}", e);
    }
}

#[cfg(all(feature = "aya", not(feature = "aya-log")))]
fn init_bpf_logger(_bpf: &mut aya::Ebpf) {}
