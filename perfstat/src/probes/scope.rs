use serde::{Deserialize, Serialize};

#[derive(Eq, Hash, PartialEq, Serialize, Deserialize, Clone, Copy, Debug, Default)]
#[serde(tag = "type")]
pub enum Scope {
    Pid {
        pid: u32,
    },
    #[default]
    SystemWide,
}
