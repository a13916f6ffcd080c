use log::trace;
use rootref_core::{DeviceRef, GptPartition};

/// Drivers that separate the disk name and partition number with a 'p'.
const P_SEPARATED_PREFIXES: [&str; 2] = ["nvme", "mmcblk"];

/// Reduces a GPT reference to a device name using the partition table of
/// `parent`.
///
/// Non-GPT references are returned unchanged. When no partition matches the
/// GPT reference is returned unchanged as well, so callers must treat a GPT
/// kind coming back from here as "device not found".
pub fn resolve_from_gpt_table(
    reference: &DeviceRef,
    parent: &str,
    table: &[GptPartition],
) -> DeviceRef {
    if !reference.is_gpt() {
        return reference.clone();
    }

    for part in table {
        let index = match reference {
            DeviceRef::GptType(type_guid) if *type_guid == part.type_guid => Some(part.num as u64),
            DeviceRef::GptUuid(uuid) if *uuid == part.uuid => Some(part.num as u64),
            // the matched entry is only an anchor, the target need not exist
            DeviceRef::GptUuidOffset { uuid, offset } if *uuid == part.uuid => {
                Some(part.num as u64 + *offset as u64)
            }
            DeviceRef::GptLabel(label) if *label == part.name => Some(part.num as u64),
            _ => None,
        };
        if let Some(index) = index {
            let name = partition_device_name(parent, index);
            trace!("{} matched partition {} of {}: {}", reference, part.num, parent, name);
            return DeviceRef::Name(name);
        }
    }

    trace!("{} matched no partition of {}", reference, parent);
    reference.clone()
}

/// Device name of the partition with 0-based `index` on disk `parent`.
pub fn partition_device_name(parent: &str, index: u64) -> String {
    let separator = if P_SEPARATED_PREFIXES
        .iter()
        .any(|prefix| parent.starts_with(prefix))
    {
        "p"
    } else {
        ""
    };
    // device node numbering starts at 1
    format!("{}{}{}", parent, separator, index + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    const ROOT_TYPE: Uuid = Uuid::from_u128(0x4f68bce3_e8cd_4db1_96e7_fbcaf984b709);
    const ESP_TYPE: Uuid = Uuid::from_u128(0xc12a7328_f81f_11d2_ba4b_00a0c93ec93b);
    const ESP_UUID: Uuid = Uuid::from_u128(0x11111111_1111_1111_1111_111111111111);
    const ROOT_UUID: Uuid = Uuid::from_u128(0x22222222_2222_2222_2222_222222222222);
    const HOME_UUID: Uuid = Uuid::from_u128(0x33333333_3333_3333_3333_333333333333);

    fn table() -> Vec<GptPartition> {
        vec![
            GptPartition {
                num: 0,
                type_guid: ESP_TYPE,
                uuid: ESP_UUID,
                name: "EFI".to_string(),
            },
            GptPartition {
                num: 1,
                type_guid: ROOT_TYPE,
                uuid: ROOT_UUID,
                name: "root".to_string(),
            },
            GptPartition {
                num: 2,
                type_guid: ROOT_TYPE,
                uuid: HOME_UUID,
                name: "home".to_string(),
            },
        ]
    }

    fn name(value: &str) -> DeviceRef {
        DeviceRef::Name(value.to_string())
    }

    #[test]
    fn non_gpt_references_pass_through() {
        for reference in [
            name("sda1"),
            DeviceRef::FsUuid(ROOT_UUID),
            DeviceRef::FsLabel("root".to_string()),
        ] {
            assert_eq!(resolve_from_gpt_table(&reference, "sda", &table()), reference);
        }
    }

    #[test]
    fn type_guid_takes_first_match_in_table_order() {
        let reference = DeviceRef::GptType(ROOT_TYPE);
        assert_eq!(resolve_from_gpt_table(&reference, "sda", &table()), name("sda2"));
        let mut reversed = table();
        reversed.reverse();
        assert_eq!(resolve_from_gpt_table(&reference, "sda", &reversed), name("sda3"));
    }

    #[test]
    fn resolves_partition_uuid() {
        let reference = DeviceRef::GptUuid(ESP_UUID);
        assert_eq!(resolve_from_gpt_table(&reference, "vda", &table()), name("vda1"));
    }

    #[test]
    fn resolves_label_case_sensitively() {
        let reference = DeviceRef::GptLabel("home".to_string());
        assert_eq!(
            resolve_from_gpt_table(&reference, "mmcblk0", &table()),
            name("mmcblk0p3")
        );
        let upper = DeviceRef::GptLabel("HOME".to_string());
        assert_eq!(resolve_from_gpt_table(&upper, "mmcblk0", &table()), upper);
    }

    #[test]
    fn offset_is_applied_to_anchor_partition() {
        let reference = DeviceRef::GptUuidOffset {
            uuid: ESP_UUID,
            offset: 1,
        };
        assert_eq!(
            resolve_from_gpt_table(&reference, "nvme0n1", &table()),
            name("nvme0n1p2")
        );
        assert_eq!(resolve_from_gpt_table(&reference, "sda", &table()), name("sda2"));
    }

    #[test]
    fn offset_past_table_end_still_yields_a_name() {
        let reference = DeviceRef::GptUuidOffset {
            uuid: HOME_UUID,
            offset: 40,
        };
        let resolved = resolve_from_gpt_table(&reference, "sdb", &table());
        assert_eq!(resolved, name("sdb43"));
        assert!(!table().iter().any(|part| part.num == 42));
    }

    #[test]
    fn max_offset_does_not_overflow() {
        let anchor = GptPartition {
            num: u32::MAX,
            type_guid: ROOT_TYPE,
            uuid: ROOT_UUID,
            name: String::new(),
        };
        let reference = DeviceRef::GptUuidOffset {
            uuid: ROOT_UUID,
            offset: u32::MAX,
        };
        let expected = format!("sda{}", u32::MAX as u64 * 2 + 1);
        assert_eq!(resolve_from_gpt_table(&reference, "sda", &[anchor]), name(&expected));
    }

    #[test]
    fn unmatched_reference_is_returned_unchanged() {
        let missing = Uuid::from_u128(0x44444444_4444_4444_4444_444444444444);
        for reference in [
            DeviceRef::GptType(missing),
            DeviceRef::GptUuid(missing),
            DeviceRef::GptUuidOffset {
                uuid: missing,
                offset: 1,
            },
            DeviceRef::GptLabel("swap".to_string()),
        ] {
            let resolved = resolve_from_gpt_table(&reference, "sda", &table());
            assert_eq!(resolved, reference);
            assert_eq!(resolved.device_name(), None);
        }
        let empty = resolve_from_gpt_table(&DeviceRef::GptType(ROOT_TYPE), "sda", &[]);
        assert_eq!(empty, DeviceRef::GptType(ROOT_TYPE));
    }

    #[test]
    fn partition_names_follow_driver_convention() {
        assert_eq!(partition_device_name("sda", 0), "sda1");
        assert_eq!(partition_device_name("vdb", 9), "vdb10");
        assert_eq!(partition_device_name("nvme1n1", 0), "nvme1n1p1");
        assert_eq!(partition_device_name("mmcblk1", 2), "mmcblk1p3");
    }
}
