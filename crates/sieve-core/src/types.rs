//! Core type definitions shared by the parser, the index and the request path.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// Rule Actions
// =============================================================================

/// What a matching rule asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RuleAction {
    /// Exception rule (@@...) - allows the request
    Allow = 0,
    /// Block rule - cancels the request
    Block = 1,
}

// =============================================================================
// Rule Flags
// =============================================================================

bitflags::bitflags! {
    /// Flags for rule behavior.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RuleFlags: u16 {
        /// Case-sensitive matching ($match-case)
        const MATCH_CASE = 1 << 0;
        /// $badfilter - cancels the identical rule without this option
        const BADFILTER = 1 << 1;
        /// Rule has right anchor (ends with |)
        const HAS_RIGHT_ANCHOR = 1 << 2;
        /// Rule has hostname anchor (||)
        const HAS_HOST_ANCHOR = 1 << 3;
        /// Rule has left anchor (starts with |)
        const HAS_LEFT_ANCHOR = 1 << 4;
        /// Rule came from a hosts-file line
        const FROM_HOSTS_FILE = 1 << 5;
    }
}

// =============================================================================
// Element Types (filter-side type mask)
// =============================================================================

bitflags::bitflags! {
    /// Element types a rule applies to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ElementTypes: u16 {
        const OTHER = 1 << 0;
        const SCRIPT = 1 << 1;
        const IMAGE = 1 << 2;
        const STYLESHEET = 1 << 3;
        const OBJECT = 1 << 4;
        const SUBDOCUMENT = 1 << 5;
        const DOCUMENT = 1 << 6;
        const XMLHTTPREQUEST = 1 << 7;
        const POPUP = 1 << 8;
        const FONT = 1 << 9;
        const MEDIA = 1 << 10;
        const WEBSOCKET = 1 << 11;
        const PING = 1 << 12;

        /// Mask for rules without type options. Filter lists never apply an
        /// untyped rule to the page document itself or to popups.
        const DEFAULT = Self::OTHER.bits()
            | Self::SCRIPT.bits()
            | Self::IMAGE.bits()
            | Self::STYLESHEET.bits()
            | Self::OBJECT.bits()
            | Self::SUBDOCUMENT.bits()
            | Self::XMLHTTPREQUEST.bits()
            | Self::FONT.bits()
            | Self::MEDIA.bits()
            | Self::WEBSOCKET.bits()
            | Self::PING.bits();
    }
}

impl ElementTypes {
    /// Parse a filter option keyword (`script`, `xhr`, ...).
    pub fn from_option(name: &str) -> Option<Self> {
        let mask = match name {
            "script" => Self::SCRIPT,
            "image" => Self::IMAGE,
            "stylesheet" => Self::STYLESHEET,
            "object" | "object-subrequest" => Self::OBJECT,
            "subdocument" | "frame" => Self::SUBDOCUMENT,
            "document" | "doc" => Self::DOCUMENT,
            "xmlhttprequest" | "xhr" => Self::XMLHTTPREQUEST,
            "popup" => Self::POPUP,
            "font" => Self::FONT,
            "media" => Self::MEDIA,
            "websocket" => Self::WEBSOCKET,
            "ping" | "beacon" => Self::PING,
            "other" => Self::OTHER,
            _ => return None,
        };
        Some(mask)
    }
}

// =============================================================================
// Resource Types (request-side, closed set)
// =============================================================================

/// Resource type of a pending request as reported by the network layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceType {
    MainFrame,
    SubFrame,
    Stylesheet,
    Script,
    Image,
    Font,
    Object,
    Xhr,
    Ping,
    CspReport,
    Media,
    WebSocket,
    Other,
}

impl ResourceType {
    /// The element type filter rules see for this resource.
    pub fn element_type(self) -> ElementTypes {
        match self {
            Self::MainFrame => ElementTypes::DOCUMENT,
            Self::SubFrame => ElementTypes::SUBDOCUMENT,
            Self::Stylesheet => ElementTypes::STYLESHEET,
            Self::Script => ElementTypes::SCRIPT,
            Self::Image => ElementTypes::IMAGE,
            Self::Font => ElementTypes::FONT,
            Self::Object => ElementTypes::OBJECT,
            Self::Xhr => ElementTypes::XMLHTTPREQUEST,
            Self::Ping => ElementTypes::PING,
            Self::Media => ElementTypes::MEDIA,
            Self::WebSocket => ElementTypes::WEBSOCKET,
            Self::CspReport | Self::Other => ElementTypes::OTHER,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MainFrame => "mainFrame",
            Self::SubFrame => "subFrame",
            Self::Stylesheet => "stylesheet",
            Self::Script => "script",
            Self::Image => "image",
            Self::Font => "font",
            Self::Object => "object",
            Self::Xhr => "xhr",
            Self::Ping => "ping",
            Self::CspReport => "cspReport",
            Self::Media => "media",
            Self::WebSocket => "webSocket",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for resource type names outside the known set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown resource type: {0}")]
pub struct UnknownResourceType(pub String);

impl FromStr for ResourceType {
    type Err = UnknownResourceType;

    /// Accepts both the camelCase names of the host runtime and the
    /// snake_case names of the webRequest API.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ty = match s {
            "mainFrame" | "main_frame" | "document" => Self::MainFrame,
            "subFrame" | "sub_frame" | "subdocument" => Self::SubFrame,
            "stylesheet" => Self::Stylesheet,
            "script" => Self::Script,
            "image" => Self::Image,
            "font" => Self::Font,
            "object" => Self::Object,
            "xhr" | "xmlhttprequest" | "fetch" => Self::Xhr,
            "ping" | "beacon" => Self::Ping,
            "cspReport" | "csp_report" => Self::CspReport,
            "media" => Self::Media,
            "webSocket" | "websocket" => Self::WebSocket,
            "other" => Self::Other,
            _ => return Err(UnknownResourceType(s.to_string())),
        };
        Ok(ty)
    }
}

// =============================================================================
// Party Masks
// =============================================================================

bitflags::bitflags! {
    /// Party (first-party / third-party) restriction. Empty means either.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PartyMask: u8 {
        const FIRST_PARTY = 1 << 0;
        const THIRD_PARTY = 1 << 1;
        const ALL = Self::FIRST_PARTY.bits() | Self::THIRD_PARTY.bits();
    }
}

impl PartyMask {
    /// Whether a rule with this mask applies to a request of the given party.
    #[inline]
    pub fn admits(self, is_third_party: bool) -> bool {
        if self.is_empty() {
            return true;
        }
        if is_third_party {
            self.contains(Self::THIRD_PARTY)
        } else {
            self.contains(Self::FIRST_PARTY)
        }
    }
}

// =============================================================================
// Request Descriptor
// =============================================================================

/// A pending network request, as handed over by the interception layer.
#[derive(Debug, Clone, Copy)]
pub struct RequestDescriptor<'a> {
    /// Full request URL
    pub url: &'a str,
    pub resource_type: ResourceType,
    /// Host of the document that issued the request, if known
    pub initiating_domain: Option<&'a str>,
    /// Top-level navigation
    pub is_main_frame: bool,
}

// =============================================================================
// Verdict
// =============================================================================

/// Final per-request decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Let the original request through
    Pass,
    /// Cancel the request
    Cancel,
    /// Send the request to a rewritten URL instead
    Redirect(String),
}

impl Verdict {
    pub fn is_cancel(&self) -> bool {
        matches!(self, Self::Cancel)
    }
}

/// Wire shape of a verdict for the network-interception collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub cancel: bool,
    #[serde(rename = "redirectURL", skip_serializing_if = "Option::is_none", default)]
    pub redirect_url: Option<String>,
}

impl From<Verdict> for Decision {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Pass => Self { cancel: false, redirect_url: None },
            Verdict::Cancel => Self { cancel: true, redirect_url: None },
            Verdict::Redirect(url) => Self { cancel: false, redirect_url: Some(url) },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_type_accepts_both_naming_styles() {
        assert_eq!("mainFrame".parse::<ResourceType>(), Ok(ResourceType::MainFrame));
        assert_eq!("main_frame".parse::<ResourceType>(), Ok(ResourceType::MainFrame));
        assert_eq!("xmlhttprequest".parse::<ResourceType>(), Ok(ResourceType::Xhr));
        assert_eq!("webSocket".parse::<ResourceType>(), Ok(ResourceType::WebSocket));
        assert!("bogus".parse::<ResourceType>().is_err());
    }

    #[test]
    fn resource_type_round_trips_through_as_str() {
        for ty in [
            ResourceType::MainFrame,
            ResourceType::SubFrame,
            ResourceType::CspReport,
            ResourceType::WebSocket,
            ResourceType::Xhr,
        ] {
            assert_eq!(ty.as_str().parse::<ResourceType>(), Ok(ty));
        }
    }

    #[test]
    fn default_element_mask_excludes_document_and_popup() {
        assert!(!ElementTypes::DEFAULT.contains(ElementTypes::DOCUMENT));
        assert!(!ElementTypes::DEFAULT.contains(ElementTypes::POPUP));
        assert!(ElementTypes::DEFAULT.contains(ElementTypes::SCRIPT));
        assert!(ElementTypes::DEFAULT.contains(ElementTypes::OTHER));
    }

    #[test]
    fn party_mask_admits() {
        assert!(PartyMask::empty().admits(true));
        assert!(PartyMask::empty().admits(false));
        assert!(PartyMask::THIRD_PARTY.admits(true));
        assert!(!PartyMask::THIRD_PARTY.admits(false));
        assert!(PartyMask::FIRST_PARTY.admits(false));
    }

    #[test]
    fn decision_serializes_like_the_network_layer_expects() {
        let json = serde_json::to_string(&Decision::from(Verdict::Cancel)).unwrap();
        assert_eq!(json, r#"{"cancel":true}"#);

        let json = serde_json::to_string(&Decision::from(Verdict::Redirect(
            "https://example.com/".into(),
        )))
        .unwrap();
        assert_eq!(json, r#"{"cancel":false,"redirectURL":"https://example.com/"}"#);
    }
}
