//! Message catalog exchanged between the originator, the directory, the
//! issuer authentication service and the device client.
//!
//! Field names follow the EMV 3-D Secure JSON attribute names so a message
//! serialized here round-trips through any conforming peer.

use super::card_range::{AccountNumber, CardRange, ProtocolVersion};
use crate::error::{Result, ThreeDsError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    AReq,
    ARes,
    CReq,
    CRes,
    RReq,
    RRes,
    PReq,
    PRes,
    Erro,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The identifiers every message of one transaction carries.
///
/// Each role fills in its own identifier the first time it sees the
/// transaction; from then on the set is immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TransactionIds {
    #[serde(
        rename = "threeDSServerTransID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub three_ds_server: Option<Uuid>,
    #[serde(rename = "dsTransID", default, skip_serializing_if = "Option::is_none")]
    pub ds: Option<Uuid>,
    #[serde(rename = "acsTransID", default, skip_serializing_if = "Option::is_none")]
    pub acs: Option<Uuid>,
    #[serde(rename = "sdkTransID", default, skip_serializing_if = "Option::is_none")]
    pub sdk: Option<Uuid>,
}

impl TransactionIds {
    pub fn originated(three_ds_server: Uuid) -> Self {
        Self {
            three_ds_server: Some(three_ds_server),
            ..Self::default()
        }
    }

    pub fn with_ds(self, ds: Uuid) -> Self {
        Self {
            ds: Some(ds),
            ..self
        }
    }

    pub fn with_acs(self, acs: Uuid) -> Self {
        Self {
            acs: Some(acs),
            ..self
        }
    }

    pub fn with_sdk(self, sdk: Option<Uuid>) -> Self {
        Self { sdk, ..self }
    }

    /// Checks that every identifier already known in `expected` appears
    /// unchanged in `self`.
    pub fn ensure_consistent(&self, expected: &TransactionIds) -> Result<()> {
        let pairs = [
            ("threeDSServerTransID", expected.three_ds_server, self.three_ds_server),
            ("dsTransID", expected.ds, self.ds),
            ("acsTransID", expected.acs, self.acs),
            ("sdkTransID", expected.sdk, self.sdk),
        ];
        for (field, expected, received) in pairs {
            if let Some(expected) = expected
                && received != Some(expected)
            {
                return Err(ThreeDsError::MismatchedIdentifier {
                    field,
                    expected: expected.to_string(),
                    received: received.map_or_else(|| "none".to_string(), |id| id.to_string()),
                });
            }
        }
        Ok(())
    }
}

/// Common accessors over every message in the catalog.
pub trait ProtocolMessage {
    const TYPE: MessageType;

    fn message_type(&self) -> MessageType;
    fn message_version(&self) -> ProtocolVersion;
    fn ids(&self) -> &TransactionIds;

    /// Rejects a message whose `messageType` tag does not match its shape.
    fn ensure_type(&self) -> Result<()> {
        if self.message_type() != Self::TYPE {
            return Err(ThreeDsError::Validation(format!(
                "expected messageType {}, received {}",
                Self::TYPE,
                self.message_type()
            )));
        }
        Ok(())
    }
}

macro_rules! protocol_message {
    ($($message:ty => $tag:ident),+ $(,)?) => {
        $(
            impl ProtocolMessage for $message {
                const TYPE: MessageType = MessageType::$tag;

                fn message_type(&self) -> MessageType {
                    self.message_type
                }

                fn message_version(&self) -> ProtocolVersion {
                    self.message_version
                }

                fn ids(&self) -> &TransactionIds {
                    &self.ids
                }
            }
        )+
    };
}

protocol_message! {
    AuthenticationRequest => AReq,
    AuthenticationResponse => ARes,
    ChallengeRequest => CReq,
    ChallengeResponse => CRes,
    ResultsRequest => RReq,
    ResultsResponse => RRes,
    ProvisioningRequest => PReq,
    ProvisioningResponse => PRes,
    ProtocolError => Erro,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceChannel {
    #[serde(rename = "01")]
    App,
    #[serde(rename = "02")]
    Browser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageCategory {
    #[serde(rename = "01")]
    Payment,
    #[serde(rename = "02")]
    NonPayment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransStatus {
    #[serde(rename = "Y")]
    Authenticated,
    #[serde(rename = "N")]
    NotAuthenticated,
    #[serde(rename = "U")]
    Unavailable,
    #[serde(rename = "A")]
    Attempted,
    #[serde(rename = "C")]
    ChallengeRequired,
    #[serde(rename = "R")]
    Rejected,
    #[serde(rename = "I")]
    InformationalOnly,
}

impl TransStatus {
    /// Every status except `ChallengeRequired` ends the transaction.
    pub fn is_final(self) -> bool {
        self != TransStatus::ChallengeRequired
    }
}

/// Yes/no flag as used by `challengeCompletionInd`, `resendChallenge` and friends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Indicator {
    #[serde(rename = "Y")]
    Yes,
    #[serde(rename = "N")]
    No,
}

impl Indicator {
    pub fn is_set(flag: Option<Indicator>) -> bool {
        flag == Some(Indicator::Yes)
    }
}

impl From<bool> for Indicator {
    fn from(value: bool) -> Self {
        if value { Indicator::Yes } else { Indicator::No }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThreeDsCompInd {
    Y,
    N,
    U,
}

/// `threeDSRequestorChallengeInd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChallengeIndicator {
    #[serde(rename = "01")]
    NoPreference,
    #[serde(rename = "02")]
    NoChallengeRequested,
    #[serde(rename = "03")]
    ChallengeRequested,
    #[serde(rename = "04")]
    ChallengeMandated,
}

/// `challengeCancel`: why a challenge ended without completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChallengeCancel {
    #[serde(rename = "01")]
    CardholderCancelled,
    #[serde(rename = "02")]
    RequestorCancelled,
    #[serde(rename = "04")]
    AcsTimeout,
    #[serde(rename = "05")]
    FirstRequestTimeout,
    #[serde(rename = "06")]
    TransactionError,
    #[serde(rename = "07")]
    Unknown,
    #[serde(rename = "08")]
    SdkTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AcsUiType {
    #[serde(rename = "01")]
    Text,
    #[serde(rename = "02")]
    SingleSelect,
    #[serde(rename = "03")]
    MultiSelect,
    #[serde(rename = "04")]
    OutOfBand,
    #[serde(rename = "05")]
    Html,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultsStatus {
    #[serde(rename = "01")]
    Received,
    #[serde(rename = "02")]
    ChallengeRequestNotSent,
    #[serde(rename = "03")]
    ChallengeDataNotDelivered,
}

/// The AReq message: the originator's request to authenticate a cardholder.
/// There is exactly one per transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationRequest {
    pub message_type: MessageType,
    pub message_version: ProtocolVersion,
    #[serde(flatten)]
    pub ids: TransactionIds,
    #[serde(rename = "threeDSServerRefNumber")]
    pub server_ref_number: String,
    #[serde(rename = "threeDSServerURL")]
    pub server_url: String,
    #[serde(rename = "threeDSRequestorID")]
    pub requestor_id: String,
    #[serde(rename = "threeDSRequestorName")]
    pub requestor_name: String,
    #[serde(rename = "threeDSRequestorURL")]
    pub requestor_url: String,
    #[serde(
        rename = "threeDSRequestorChallengeInd",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub challenge_ind: Option<ChallengeIndicator>,
    #[serde(
        rename = "threeDSRequestorAppURL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub requestor_app_url: Option<String>,
    #[serde(
        rename = "threeDSCompInd",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub comp_ind: Option<ThreeDsCompInd>,
    pub acct_number: AccountNumber,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_expiry_date: Option<String>,
    #[serde(rename = "acquirerBIN")]
    pub acquirer_bin: String,
    #[serde(rename = "acquirerMerchantID")]
    pub acquirer_merchant_id: String,
    pub mcc: String,
    pub merchant_country_code: String,
    pub merchant_name: String,
    pub device_channel: DeviceChannel,
    pub message_category: MessageCategory,
    #[serde(
        rename = "notificationURL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub notification_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_exponent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_accept_header: Option<String>,
    #[serde(rename = "browserIP", default, skip_serializing_if = "Option::is_none")]
    pub browser_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_user_agent: Option<String>,
    #[serde(rename = "sdkAppID", default, skip_serializing_if = "Option::is_none")]
    pub sdk_app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdk_max_timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdk_reference_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_extension: Option<Vec<Value>>,
}

/// The ARes message: the issuer service's decision for an AReq.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationResponse {
    pub message_type: MessageType,
    pub message_version: ProtocolVersion,
    #[serde(flatten)]
    pub ids: TransactionIds,
    pub trans_status: TransStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trans_status_reason: Option<String>,
    #[serde(rename = "acsURL", default, skip_serializing_if = "Option::is_none")]
    pub acs_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acs_challenge_mandated: Option<Indicator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acs_reference_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ds_reference_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eci: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cardholder_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_extension: Option<Vec<Value>>,
}

/// The CReq message: one round of cardholder interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRequest {
    pub message_type: MessageType,
    pub message_version: ProtocolVersion,
    #[serde(flatten)]
    pub ids: TransactionIds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge_cancel: Option<ChallengeCancel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge_data_entry: Option<String>,
    #[serde(
        rename = "challengeHTMLDataEntry",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub challenge_html_data_entry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge_no_entry: Option<Indicator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge_window_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oob_continue: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resend_challenge: Option<Indicator>,
    #[serde(
        rename = "sdkCounterStoA",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sdk_counter_s_to_a: Option<String>,
    #[serde(
        rename = "threeDSRequestorAppURL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub requestor_app_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whitelisting_data_entry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_extension: Option<Vec<Value>>,
}

impl ChallengeRequest {
    /// An empty request for the given transaction; callers fill in the
    /// cardholder's entry.
    pub fn new(version: ProtocolVersion, ids: TransactionIds) -> Self {
        Self {
            message_type: MessageType::CReq,
            message_version: version,
            ids,
            challenge_cancel: None,
            challenge_data_entry: None,
            challenge_html_data_entry: None,
            challenge_no_entry: None,
            challenge_window_size: None,
            oob_continue: None,
            resend_challenge: None,
            sdk_counter_s_to_a: None,
            requestor_app_url: None,
            whitelisting_data_entry: None,
            message_extension: None,
        }
    }
}

/// The CRes message: the issuer service's answer to one CReq.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeResponse {
    pub message_type: MessageType,
    pub message_version: ProtocolVersion,
    #[serde(flatten)]
    pub ids: TransactionIds,
    #[serde(
        rename = "acsCounterAtoS",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub acs_counter_a_to_s: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acs_ui_type: Option<AcsUiType>,
    #[serde(rename = "acsHTML", default, skip_serializing_if = "Option::is_none")]
    pub acs_html: Option<String>,
    pub challenge_completion_ind: Indicator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge_info_header: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge_info_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge_info_text: Option<String>,
    #[serde(rename = "oobAppURL", default, skip_serializing_if = "Option::is_none")]
    pub oob_app_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oob_continue_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resend_information_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit_authentication_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why_info_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why_info_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trans_status: Option<TransStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_extension: Option<Vec<Value>>,
}

impl ChallengeResponse {
    pub fn is_complete(&self) -> bool {
        self.challenge_completion_ind == Indicator::Yes
    }
}

/// The RReq message: the final outcome of a challenged transaction, sent by
/// the issuer service through the directory to the originator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsRequest {
    pub message_type: MessageType,
    pub message_version: ProtocolVersion,
    #[serde(flatten)]
    pub ids: TransactionIds,
    pub trans_status: TransStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trans_status_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge_cancel: Option<ChallengeCancel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction_counter: Option<String>,
    pub message_category: MessageCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eci: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_extension: Option<Vec<Value>>,
}

/// The RRes message: the originator's acknowledgment of an RReq.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsResponse {
    pub message_type: MessageType,
    pub message_version: ProtocolVersion,
    #[serde(flatten)]
    pub ids: TransactionIds,
    pub results_status: ResultsStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_extension: Option<Vec<Value>>,
}

impl ResultsResponse {
    pub fn acknowledge(request: &ResultsRequest) -> Self {
        Self {
            message_type: MessageType::RRes,
            message_version: request.message_version,
            ids: request.ids,
            results_status: ResultsStatus::Received,
            message_extension: None,
        }
    }
}

/// The PReq message: a card range query; not part of any authentication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningRequest {
    pub message_type: MessageType,
    pub message_version: ProtocolVersion,
    #[serde(flatten)]
    pub ids: TransactionIds,
    #[serde(rename = "threeDSServerRefNumber")]
    pub server_ref_number: String,
    #[serde(
        rename = "threeDSServerOperatorID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub server_operator_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_num: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_extension: Option<Vec<Value>>,
}

/// The PRes message: a read-only snapshot of the card range directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningResponse {
    pub message_type: MessageType,
    pub message_version: ProtocolVersion,
    #[serde(flatten)]
    pub ids: TransactionIds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_range_data: Option<Vec<CardRange>>,
    pub ds_start_protocol_version: ProtocolVersion,
    pub ds_end_protocol_version: ProtocolVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_num: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_extension: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorComponent {
    #[serde(rename = "C")]
    DeviceClient,
    #[serde(rename = "S")]
    Originator,
    #[serde(rename = "D")]
    Directory,
    #[serde(rename = "A")]
    IssuerService,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "101")]
    MessageReceivedInvalid,
    #[serde(rename = "102")]
    VersionNotSupported,
    #[serde(rename = "201")]
    RequiredElementMissing,
    #[serde(rename = "203")]
    InvalidFormat,
    #[serde(rename = "301")]
    TransactionIdNotRecognised,
    #[serde(rename = "305")]
    TransactionDataNotValid,
    #[serde(rename = "307")]
    SerialNumberNotValid,
    #[serde(rename = "402")]
    TransactionTimedOut,
    #[serde(rename = "403")]
    TransientSystemFailure,
    #[serde(rename = "405")]
    SystemConnectionFailure,
}

impl ErrorCode {
    pub fn description(self) -> &'static str {
        match self {
            ErrorCode::MessageReceivedInvalid => "message received invalid",
            ErrorCode::VersionNotSupported => "message version number not supported",
            ErrorCode::RequiredElementMissing => "required data element missing",
            ErrorCode::InvalidFormat => "format of one or more data elements is invalid",
            ErrorCode::TransactionIdNotRecognised => "transaction ID not recognised",
            ErrorCode::TransactionDataNotValid => "transaction data not valid",
            ErrorCode::SerialNumberNotValid => "serial number not valid",
            ErrorCode::TransactionTimedOut => "transaction timed out",
            ErrorCode::TransientSystemFailure => "transient system failure",
            ErrorCode::SystemConnectionFailure => "system connection failure",
        }
    }
}

/// The Erro message. Replaces the expected response of whatever message it
/// reports against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolError {
    pub message_type: MessageType,
    pub message_version: ProtocolVersion,
    #[serde(flatten)]
    pub ids: TransactionIds,
    pub error_code: ErrorCode,
    pub error_component: ErrorComponent,
    pub error_description: String,
    pub error_detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message_type: Option<MessageType>,
}

impl ProtocolError {
    pub const VERSION: ProtocolVersion = ProtocolVersion::new(2, 2, 0);

    pub fn new(
        component: ErrorComponent,
        code: ErrorCode,
        description: impl Into<String>,
        detail: impl Into<String>,
        ids: TransactionIds,
        error_message_type: Option<MessageType>,
    ) -> Self {
        Self {
            message_type: MessageType::Erro,
            message_version: Self::VERSION,
            ids,
            error_code: code,
            error_component: component,
            error_description: description.into(),
            error_detail: detail.into(),
            error_message_type,
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "protocol error {:?} from {:?}: {} ({})",
            self.error_code, self.error_component, self.error_description, self.error_detail
        )
    }
}

/// 3-D Secure 1.0 messages. Recognized by name only; the XML protocol is
/// not implemented.
pub mod legacy {
    use serde::{Deserialize, Serialize};

    /// Payer authentication request, the 1.0 counterpart of CReq/RReq.
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct PAReq {
        pub placeholder: Option<String>,
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct PARes {
        pub placeholder: Option<String>,
    }

    /// Verify enrolment request, the 1.0 counterpart of AReq.
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct VEReq {
        pub placeholder: Option<String>,
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct VERes {
        pub placeholder: Option<String>,
    }
}
