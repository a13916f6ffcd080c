//! Parsing of `root=`-style boot parameters into [`DeviceRef`] values.

use log::debug;
use rootref_core::{Arch, DeviceRef};
use std::num::ParseIntError;
use thiserror::Error;
use uuid::Uuid;

const FS_UUID_PREFIXES: [&str; 2] = ["UUID=", "/dev/disk/by-uuid/"];
const FS_LABEL_PREFIXES: [&str; 2] = ["LABEL=", "/dev/disk/by-label/"];
const PARTUUID_PREFIX: &str = "PARTUUID=";
const BY_PARTUUID_PREFIX: &str = "/dev/disk/by-partuuid/";
const GPT_LABEL_PREFIXES: [&str; 2] = ["PARTLABEL=", "/dev/disk/by-partlabel/"];
const DEV_PREFIX: &str = "/dev/";
const PARTNROFF: &str = "/PARTNROFF=";

const HYPHENATED_UUID_LEN: usize = 36;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("{param}= boot option is not specified")]
    MissingParameter { param: String },
    #[error("unable to parse {param}= parameter '{value}'")]
    UnparsableParameter { param: String, value: String },
    #[error("unable to parse UUID in {param}= parameter '{value}': {reason}")]
    InvalidUuid {
        param: String,
        value: String,
        reason: String,
    },
    #[error("unable to parse PARTNROFF= value in {param}= parameter '{value}'")]
    InvalidOffset {
        param: String,
        value: String,
        #[source]
        source: ParseIntError,
    },
}

/// Architecture and autodiscovery switch used when the parameter is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
    pub arch: Arch,
    pub autodetect: bool,
}

impl ParserConfig {
    pub fn new(arch: Arch, autodetect: bool) -> Self {
        Self { arch, autodetect }
    }

    pub fn for_current_arch(autodetect: bool) -> Self {
        Self::new(Arch::current(), autodetect)
    }
}

/// Parses `value` using the architecture this binary was built for.
pub fn parse_device_ref(
    param: &str,
    value: &str,
    autodetect: bool,
) -> Result<DeviceRef, ParseError> {
    parse_device_ref_with(&ParserConfig::for_current_arch(autodetect), param, value)
}

/// Parses one boot parameter value. `param` is the parameter name (e.g.
/// "root") and only shows up in diagnostics.
pub fn parse_device_ref_with(
    config: &ParserConfig,
    param: &str,
    value: &str,
) -> Result<DeviceRef, ParseError> {
    if value.is_empty() {
        return autodiscover(config, param);
    }

    if let Some(rest) = strip_any_prefix(value, &FS_UUID_PREFIXES) {
        return Ok(DeviceRef::FsUuid(parse_uuid(param, value, rest)?));
    }
    if let Some(label) = strip_any_prefix(value, &FS_LABEL_PREFIXES) {
        return Ok(DeviceRef::FsLabel(label.to_string()));
    }
    if let Some(rest) = value.strip_prefix(PARTUUID_PREFIX) {
        return parse_partuuid(param, value, rest);
    }
    // the by-partuuid path has no PARTNROFF form
    if let Some(rest) = value.strip_prefix(BY_PARTUUID_PREFIX) {
        return Ok(DeviceRef::GptUuid(parse_uuid(param, value, rest)?));
    }
    if let Some(label) = strip_any_prefix(value, &GPT_LABEL_PREFIXES) {
        return Ok(DeviceRef::GptLabel(label.to_string()));
    }
    if let Some(name) = value.strip_prefix(DEV_PREFIX) {
        return Ok(DeviceRef::Name(name.to_string()));
    }

    Err(ParseError::UnparsableParameter {
        param: param.to_string(),
        value: value.to_string(),
    })
}

fn autodiscover(config: &ParserConfig, param: &str) -> Result<DeviceRef, ParseError> {
    match config.arch.root_partition_type() {
        Some(type_guid) if config.autodetect => {
            debug!(
                "{}= param is not specified. Use GPT partition autodiscovery with guid type {} ({})",
                param,
                type_guid.hyphenated(),
                config.arch
            );
            Ok(DeviceRef::GptType(type_guid))
        }
        _ => Err(ParseError::MissingParameter {
            param: param.to_string(),
        }),
    }
}

fn parse_partuuid(param: &str, value: &str, rest: &str) -> Result<DeviceRef, ParseError> {
    let Some(idx) = rest.find(PARTNROFF) else {
        return Ok(DeviceRef::GptUuid(parse_uuid(param, value, rest)?));
    };
    let offset = rest[idx + PARTNROFF.len()..]
        .parse::<u32>()
        .map_err(|source| ParseError::InvalidOffset {
            param: param.to_string(),
            value: value.to_string(),
            source,
        })?;
    let uuid = parse_uuid(param, value, &rest[..idx])?;
    Ok(DeviceRef::GptUuidOffset { uuid, offset })
}

/// Only the 36-character hyphenated form is accepted, optionally quoted.
fn parse_uuid(param: &str, value: &str, text: &str) -> Result<Uuid, ParseError> {
    let invalid = |reason: String| ParseError::InvalidUuid {
        param: param.to_string(),
        value: value.to_string(),
        reason,
    };
    let text = strip_quotes(text);
    if text.len() != HYPHENATED_UUID_LEN {
        return Err(invalid(format!(
            "expected {} characters, found {}",
            HYPHENATED_UUID_LEN,
            text.len()
        )));
    }
    Uuid::parse_str(text).map_err(|err| invalid(err.to_string()))
}

fn strip_quotes(text: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = text
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    text
}

fn strip_any_prefix<'a>(value: &'a str, prefixes: &[&str]) -> Option<&'a str> {
    prefixes.iter().find_map(|prefix| value.strip_prefix(prefix))
}
