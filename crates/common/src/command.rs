//! Menu command identifiers
//!
//! The tray menu is drawn by the UI layer, which tags each item with an
//! integer. Dynamic items encode their target as `base + coefficient * id +
//! offset`; this module owns that encoding so both sides agree on it.

use crate::engine::{MountId, PluginId};

pub const ID_ADD_MOUNT: u32 = 1001;
pub const ID_EXIT: u32 = 1002;
pub const ID_UNMOUNT_ALL: u32 = 1003;
pub const ID_OPEN_PLUGINS_DIR: u32 = 1004;

pub const PLUGIN_BASE: u32 = 10000;
pub const PLUGIN_END: u32 = 20000;
pub const PLUGIN_COEF: u32 = 1;
pub const PLUGIN_OFFSET_INFO: u32 = 0;

pub const MOUNT_BASE: u32 = 20000;
pub const MOUNT_END: u32 = 60000;
pub const MOUNT_COEF: u32 = 4;
pub const MOUNT_OFFSET_TOP: u32 = 0;
pub const MOUNT_OFFSET_OPEN: u32 = 1;
pub const MOUNT_OFFSET_OPEN_CONFIG: u32 = 2;
pub const MOUNT_OFFSET_UNMOUNT: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuCommand {
    AddMount,
    Exit,
    UnmountAll,
    OpenPluginsDir,
    PluginInfo(PluginId),
    /// Submenu header of a mount; does nothing when chosen
    MountTop(MountId),
    OpenMountPoint(MountId),
    OpenConfig(MountId),
    Unmount(MountId),
}

impl MenuCommand {
    /// Menu item id, or `None` when the target id does not fit its range
    pub fn encode(&self) -> Option<u32> {
        match *self {
            MenuCommand::AddMount => Some(ID_ADD_MOUNT),
            MenuCommand::Exit => Some(ID_EXIT),
            MenuCommand::UnmountAll => Some(ID_UNMOUNT_ALL),
            MenuCommand::OpenPluginsDir => Some(ID_OPEN_PLUGINS_DIR),
            MenuCommand::PluginInfo(id) => {
                encode_in(PLUGIN_BASE, PLUGIN_END, PLUGIN_COEF, id, PLUGIN_OFFSET_INFO)
            }
            MenuCommand::MountTop(id) => mount_item(id, MOUNT_OFFSET_TOP),
            MenuCommand::OpenMountPoint(id) => mount_item(id, MOUNT_OFFSET_OPEN),
            MenuCommand::OpenConfig(id) => mount_item(id, MOUNT_OFFSET_OPEN_CONFIG),
            MenuCommand::Unmount(id) => mount_item(id, MOUNT_OFFSET_UNMOUNT),
        }
    }

    pub fn decode(item: u32) -> Option<Self> {
        match item {
            ID_ADD_MOUNT => Some(MenuCommand::AddMount),
            ID_EXIT => Some(MenuCommand::Exit),
            ID_UNMOUNT_ALL => Some(MenuCommand::UnmountAll),
            ID_OPEN_PLUGINS_DIR => Some(MenuCommand::OpenPluginsDir),
            item if (PLUGIN_BASE..PLUGIN_END).contains(&item) => {
                let relative = item - PLUGIN_BASE;
                match relative % PLUGIN_COEF {
                    PLUGIN_OFFSET_INFO => Some(MenuCommand::PluginInfo(relative / PLUGIN_COEF)),
                    _ => None,
                }
            }
            item if (MOUNT_BASE..MOUNT_END).contains(&item) => {
                let relative = item - MOUNT_BASE;
                let id = relative / MOUNT_COEF;
                match relative % MOUNT_COEF {
                    MOUNT_OFFSET_TOP => Some(MenuCommand::MountTop(id)),
                    MOUNT_OFFSET_OPEN => Some(MenuCommand::OpenMountPoint(id)),
                    MOUNT_OFFSET_OPEN_CONFIG => Some(MenuCommand::OpenConfig(id)),
                    MOUNT_OFFSET_UNMOUNT => Some(MenuCommand::Unmount(id)),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

fn mount_item(id: MountId, offset: u32) -> Option<u32> {
    encode_in(MOUNT_BASE, MOUNT_END, MOUNT_COEF, id, offset)
}

fn encode_in(base: u32, end: u32, coef: u32, id: u32, offset: u32) -> Option<u32> {
    coef.checked_mul(id)
        .and_then(|scaled| scaled.checked_add(base))
        .and_then(|item| item.checked_add(offset))
        .filter(|item| *item < end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_ids() {
        assert_eq!(MenuCommand::AddMount.encode(), Some(1001));
        assert_eq!(MenuCommand::decode(1002), Some(MenuCommand::Exit));
        assert_eq!(MenuCommand::decode(1003), Some(MenuCommand::UnmountAll));
        assert_eq!(MenuCommand::decode(1004), Some(MenuCommand::OpenPluginsDir));
    }

    #[test]
    fn test_dynamic_ids() {
        assert_eq!(MenuCommand::PluginInfo(3).encode(), Some(10003));
        assert_eq!(MenuCommand::Unmount(2).encode(), Some(20011));
        assert_eq!(MenuCommand::decode(20005), Some(MenuCommand::OpenMountPoint(1)));
        assert_eq!(MenuCommand::decode(20006), Some(MenuCommand::OpenConfig(1)));
        assert_eq!(MenuCommand::decode(20004), Some(MenuCommand::MountTop(1)));
    }

    #[test]
    fn test_round_trip_every_mount_id() {
        for id in 0..10_000 {
            for command in [
                MenuCommand::MountTop(id),
                MenuCommand::OpenMountPoint(id),
                MenuCommand::OpenConfig(id),
                MenuCommand::Unmount(id),
            ] {
                let item = command.encode().unwrap();
                assert_eq!(MenuCommand::decode(item), Some(command));
            }
        }
        assert_eq!(MenuCommand::Unmount(10_000).encode(), None);
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(MenuCommand::PluginInfo(10_000).encode(), None);
        assert_eq!(MenuCommand::PluginInfo(u32::MAX).encode(), None);
        assert_eq!(MenuCommand::decode(0), None);
        assert_eq!(MenuCommand::decode(60000), None);
        assert_eq!(MenuCommand::decode(5000), None);
    }
}
