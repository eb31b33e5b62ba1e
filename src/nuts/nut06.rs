//! NUT-06: Mint Information
//!
//! <https://github.com/cashubtc/nuts/blob/main/06.md>

use serde::{Deserialize, Serialize};

use super::nut01::PublicKey;
use super::{nut04, nut05};

/// Mint Version
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct MintVersion {
    /// Mint Software name
    pub name: String,
    /// Mint Version
    pub version: String,
}

impl From<MintVersion> for String {
    fn from(mint_version: MintVersion) -> String {
        format!("{}/{}", mint_version.name, mint_version.version)
    }
}

impl TryFrom<String> for MintVersion {
    type Error = String;

    fn try_from(version: String) -> Result<Self, Self::Error> {
        let (name, version) = version
            .split_once('/')
            .ok_or_else(|| format!("Invalid mint version: {version}"))?;
        Ok(Self {
            name: name.to_string(),
            version: version.to_string(),
        })
    }
}

/// Mint Info [NUT-06]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintInfo {
    /// name of the mint and should be recognizable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// hex pubkey of the mint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pubkey: Option<PublicKey>,
    /// implementation name and the version running
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<MintVersion>,
    /// short description of the mint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// long description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_long: Option<String>,
    /// message of the day that the wallet must display to the user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motd: Option<String>,
    /// shows which NUTs the mint supports
    pub nuts: Nuts,
}

/// Per-NUT settings shown in [`MintInfo`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nuts {
    /// NUT04 Settings
    #[serde(rename = "4")]
    pub nut04: nut04::Settings,
    /// NUT05 Settings
    #[serde(rename = "5")]
    pub nut05: nut05::Settings,
    /// NUT07 Settings
    #[serde(rename = "7")]
    pub nut07: SupportedSettings,
    /// NUT08 Settings
    #[serde(rename = "8")]
    pub nut08: SupportedSettings,
    /// NUT09 Settings
    #[serde(rename = "9")]
    pub nut09: SupportedSettings,
    /// NUT10 Settings
    #[serde(rename = "10")]
    pub nut10: SupportedSettings,
    /// NUT11 Settings
    #[serde(rename = "11")]
    pub nut11: SupportedSettings,
    /// NUT12 Settings
    #[serde(rename = "12")]
    pub nut12: SupportedSettings,
    /// NUT14 Settings
    #[serde(rename = "14")]
    pub nut14: SupportedSettings,
}

/// Whether a NUT is supported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SupportedSettings {
    /// Supported
    pub supported: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mint_version_round_trip() {
        let version = MintVersion {
            name: "cashu-mint".to_string(),
            version: "0.1.0".to_string(),
        };

        let json = serde_json::to_string(&version).unwrap();
        assert_eq!(json, r#""cashu-mint/0.1.0""#);

        let parsed: MintVersion = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, version);
    }

    #[test]
    fn test_mint_info_serialization() {
        let info = MintInfo {
            name: Some("test mint".to_string()),
            ..Default::default()
        };

        let json = serde_json::to_string(&info).unwrap();
        let parsed: MintInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, info);
    }
}
