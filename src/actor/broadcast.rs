use serde::{Deserialize, Serialize};

use crate::model::{GroupId, WindowId};

/// One notification per completed registry operation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
pub enum BroadcastEvent {
    GroupCreated {
        group_id: GroupId,
        windows: Vec<WindowId>,
    },
    GroupChanged {
        group_id: GroupId,
        windows: Vec<WindowId>,
        active_window: Option<WindowId>,
    },
    GroupDissolved {
        group_id: GroupId,
        /// Windows still listed in the dissolved group, for cleanup.
        remaining: Vec<WindowId>,
    },
    PrimaryChanged {
        window_id: WindowId,
        group_id: GroupId,
    },
}

impl BroadcastEvent {
    pub fn group_id(&self) -> GroupId {
        match self {
            BroadcastEvent::GroupCreated { group_id, .. }
            | BroadcastEvent::GroupChanged { group_id, .. }
            | BroadcastEvent::GroupDissolved { group_id, .. }
            | BroadcastEvent::PrimaryChanged { group_id, .. } => *group_id,
        }
    }
}

pub type BroadcastSender = crate::actor::Sender<BroadcastEvent>;
pub type BroadcastReceiver = crate::actor::Receiver<BroadcastEvent>;
