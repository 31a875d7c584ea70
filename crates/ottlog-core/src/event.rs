use chrono::DateTime;
use chrono_tz::Tz;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Defines a wire enum that serializes as its integer code.
macro_rules! code_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $code:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum $name {
            $($variant = $code),+
        }

        impl $name {
            pub fn code(self) -> u8 {
                self as u8
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_u8(*self as u8)
            }
        }

        impl TryFrom<u8> for $name {
            type Error = u8;

            fn try_from(value: u8) -> Result<Self, u8> {
                match value {
                    $($code => Ok(Self::$variant),)+
                    other => Err(other),
                }
            }
        }
    };
}

code_enum! {
    /// Top-level event category (access, contents, review, ...).
    EventCategory {
        Access = 1,
        Contents = 2,
        Review = 3,
        Subscription = 4,
        Register = 5,
        Search = 6,
        Support = 7,
    }
}

code_enum! {
    /// Event type within a category.
    EventType {
        In = 1,
        Out = 2,
        Click = 3,
        Start = 4,
        Stop = 5,
        Pause = 6,
        Resume = 7,
        LikeOn = 8,
        LikeOff = 9,
        Review = 10,
        Search = 11,
        Inquiry = 12,
    }
}

code_enum! {
    /// Client platform the event originated from.
    Platform {
        Android = 1,
        Ios = 2,
        Pc = 3,
        Tv = 4,
    }
}

code_enum! {
    /// Whether a content is an episodic series or a single title.
    ContentType {
        Series = 1,
        Single = 2,
    }
}

code_enum! {
    /// Acquisition channel reported on sign-up.
    TrafficSource {
        Search = 1,
        Social = 2,
        AdSearch = 3,
        AdSocial = 4,
        Referral = 5,
        Misc = 6,
    }
}

code_enum! {
    /// Why a user deleted their account.
    ReasonType {
        Contents = 1,
        Charge = 2,
        Misc = 3,
    }
}

code_enum! {
    /// Support inquiry classification.
    InquiryType {
        Contents = 1,
        Refund = 2,
        Subscription = 3,
        Information = 4,
    }
}

/// One emitted user-behavior log line.
///
/// Serializes with the timestamp as `YYYY-MM-DD HH:MM:SS` in the configured
/// timezone and all enums as their integer codes. Absent optional fields in
/// `detail` are omitted entirely, never written as null.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub timestamp: DateTime<Tz>,
    pub user_id: i64,
    pub event_category: EventCategory,
    pub event_type: EventType,
    pub detail: EventDetail,
}

impl Serialize for LogEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("LogEvent", 5)?;
        state.serialize_field(
            "timestamp",
            &self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
        )?;
        state.serialize_field("user_id", &self.user_id)?;
        state.serialize_field("event_category", &self.event_category)?;
        state.serialize_field("event_type", &self.event_type)?;
        state.serialize_field("detail", &self.detail)?;
        state.end()
    }
}

/// Event-specific payload, discriminated by (category, type).
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum EventDetail {
    Access(AccessDetail),
    Contents(ContentsDetail),
    Review(ReviewDetail),
    Subscription(SubscriptionDetail),
    Register(RegisterDetail),
    Search(SearchDetail),
    Support(SupportDetail),
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessDetail {
    pub platform: Platform,
}

/// Payload for contents click/playback/like events.
///
/// Like events carry no platform; episode_id is present only for series.
#[derive(Debug, Clone, Serialize)]
pub struct ContentsDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    pub contents_id: String,
    pub contents_type: ContentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewDetail {
    pub contents_id: String,
    /// Rating on the 0.5 grid, 0.5 ..= 5.0.
    pub rating: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionDetail {
    pub subscription_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic_source: Option<TrafficSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_type: Option<ReasonType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchDetail {
    pub term: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SupportDetail {
    pub inquiry_type: InquiryType,
    pub inquiry_detail: String,
}
