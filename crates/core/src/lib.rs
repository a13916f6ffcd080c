use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// How the root device was specified on the boot command line.
///
/// GPT kinds only become usable once resolved against the parent disk's
/// partition table; a GPT kind that survives resolution means the device
/// was not found.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DeviceRef {
    /// Path relative to /dev, e.g. "sda1".
    Name(String),
    GptType(Uuid),
    GptUuid(Uuid),
    GptUuidOffset { uuid: Uuid, offset: u32 },
    GptLabel(String),
    FsUuid(Uuid),
    FsLabel(String),
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    Name,
    GptType,
    GptUuid,
    GptUuidOffset,
    GptLabel,
    FsUuid,
    FsLabel,
}

/// Filesystem superblock metadata of one block device.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FsInfo {
    pub uuid: Uuid,
    pub label: String,
}

/// One row of a GPT partition table. `num` is 0-based.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GptPartition {
    pub num: u32,
    pub type_guid: Uuid,
    pub uuid: Uuid,
    pub name: String,
}

impl DeviceRef {
    pub fn kind(&self) -> RefKind {
        match self {
            Self::Name(_) => RefKind::Name,
            Self::GptType(_) => RefKind::GptType,
            Self::GptUuid(_) => RefKind::GptUuid,
            Self::GptUuidOffset { .. } => RefKind::GptUuidOffset,
            Self::GptLabel(_) => RefKind::GptLabel,
            Self::FsUuid(_) => RefKind::FsUuid,
            Self::FsLabel(_) => RefKind::FsLabel,
        }
    }

    pub fn is_gpt(&self) -> bool {
        matches!(
            self,
            Self::GptType(_) | Self::GptUuid(_) | Self::GptUuidOffset { .. } | Self::GptLabel(_)
        )
    }

    /// Device name for `Name` references, `None` for everything else.
    pub fn device_name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn matches_name(&self, name: &str) -> bool {
        matches!(self, Self::Name(own) if own == name)
    }

    /// Only filesystem kinds are ever matched against superblock metadata.
    pub fn matches_fs_info(&self, info: &FsInfo) -> bool {
        match self {
            Self::FsUuid(uuid) => *uuid == info.uuid,
            Self::FsLabel(label) => *label == info.label,
            _ => false,
        }
    }
}

/// Renders the boot-parameter spelling. Parsing it back yields an equal
/// reference for anything the parser produced; a `Name` under `disk/by-*/`
/// reads back as the matching uuid or label kind.
impl fmt::Display for DeviceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "/dev/{}", name),
            // no boot parameter spells a type guid; diagnostic form only
            Self::GptType(uuid) => write!(f, "PARTTYPE={}", uuid.hyphenated()),
            Self::GptUuid(uuid) => write!(f, "PARTUUID={}", uuid.hyphenated()),
            Self::GptUuidOffset { uuid, offset } => {
                write!(f, "PARTUUID={}/PARTNROFF={}", uuid.hyphenated(), offset)
            }
            Self::GptLabel(label) => write!(f, "PARTLABEL={}", label),
            Self::FsUuid(uuid) => write!(f, "UUID={}", uuid.hyphenated()),
            Self::FsLabel(label) => write!(f, "LABEL={}", label),
        }
    }
}

/// Picks the first candidate device whose filesystem metadata matches `reference`.
pub fn find_by_fs_info<'a, I>(reference: &DeviceRef, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = (&'a str, &'a FsInfo)>,
{
    candidates
        .into_iter()
        .find(|(_, info)| reference.matches_fs_info(info))
        .map(|(name, _)| name)
}

/// CPU architecture used to pick the Discoverable Partitions root type.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Arch {
    Amd64,
    I386,
    Arm,
    Arm64,
    Unknown,
}

const ROOT_AMD64: Uuid = Uuid::from_u128(0x4f68bce3_e8cd_4db1_96e7_fbcaf984b709);
const ROOT_I386: Uuid = Uuid::from_u128(0x44479540_f297_41b2_9af7_d131d5f0458a);
const ROOT_ARM: Uuid = Uuid::from_u128(0x69dad710_2ce4_4e3c_b16c_21a1d49abed3);
const ROOT_ARM64: Uuid = Uuid::from_u128(0xb921b045_1df0_41c3_af44_4c6f280d3fae);

impl Arch {
    /// Accepts both the Go-style names used by boot tooling and Rust target names.
    pub fn from_name(name: &str) -> Self {
        match name {
            "amd64" | "x86_64" => Self::Amd64,
            "386" | "x86" | "i386" | "i686" => Self::I386,
            "arm" => Self::Arm,
            "arm64" | "aarch64" => Self::Arm64,
            _ => Self::Unknown,
        }
    }

    pub fn current() -> Self {
        Self::from_name(std::env::consts::ARCH)
    }

    /// Root partition type GUID from the Discoverable Partitions Specification.
    pub fn root_partition_type(&self) -> Option<Uuid> {
        match self {
            Self::Amd64 => Some(ROOT_AMD64),
            Self::I386 => Some(ROOT_I386),
            Self::Arm => Some(ROOT_ARM),
            Self::Arm64 => Some(ROOT_ARM64),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Amd64 => write!(f, "amd64"),
            Self::I386 => write!(f, "386"),
            Self::Arm => write!(f, "arm"),
            Self::Arm64 => write!(f, "arm64"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}
