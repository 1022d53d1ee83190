//! Remote command domain model.

use serde::{Deserialize, Serialize};

/// Kind of remote command, as named on the wire by `command_type`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommandKind {
    GetLocation,
    GetScreenshot,
    GetPhoto,
    GetAudio,
    GetAllData,
    /// Any value the agent does not recognize, kept verbatim.
    Unknown(String),
}

impl CommandKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::GetLocation => "GET_LOCATION",
            Self::GetScreenshot => "GET_SCREENSHOT",
            Self::GetPhoto => "GET_PHOTO",
            Self::GetAudio => "GET_AUDIO",
            Self::GetAllData => "GET_ALL_DATA",
            Self::Unknown(raw) => raw,
        }
    }

    /// Parses a wire value. Never fails: unrecognized values become `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "GET_LOCATION" => Self::GetLocation,
            "GET_SCREENSHOT" => Self::GetScreenshot,
            "GET_PHOTO" => Self::GetPhoto,
            "GET_AUDIO" => Self::GetAudio,
            "GET_ALL_DATA" => Self::GetAllData,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Label used for metrics; unknown kinds collapse to a single label.
    pub fn metric_label(&self) -> &'static str {
        match self {
            Self::GetLocation => "get_location",
            Self::GetScreenshot => "get_screenshot",
            Self::GetPhoto => "get_photo",
            Self::GetAudio => "get_audio",
            Self::GetAllData => "get_all_data",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for CommandKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CommandKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// A unit of remote work fetched from the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: i64,
    #[serde(rename = "command_type")]
    pub kind: CommandKind,
    pub device_id: String,
}

/// Response body of `GET command.php`.
///
/// A missing or `null` `commands` key means there is nothing to do.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandBatch {
    #[serde(default, deserialize_with = "deserialize_commands")]
    pub commands: Vec<Command>,
}

/// Accepts `5` as well as `"5"`; PHP backends often send ids as strings.
fn deserialize_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Number(id) => Ok(id),
        RawId::Text(text) => text.trim().parse().map_err(|_| {
            serde::de::Error::custom(format!("command id is not an integer: {:?}", text))
        }),
    }
}

fn deserialize_commands<'de, D>(deserializer: D) -> Result<Vec<Command>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<Command>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Request payload for `PUT command.php`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandAck {
    pub command_id: i64,
    pub status: String,
}

impl CommandAck {
    pub fn executed(command_id: i64) -> Self {
        Self {
            command_id,
            status: "executed".to_string(),
        }
    }
}
