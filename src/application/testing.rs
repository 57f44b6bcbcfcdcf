//! Message builders shared by unit tests.

use crate::domain::card_range::{AccountNumber, CardRange, ProtocolVersion};
use crate::domain::messages::{
    AuthenticationRequest, DeviceChannel, MessageCategory, MessageType, TransactionIds,
};
use uuid::Uuid;

pub fn card_range(acs_id: &str, start: &str, end: &str) -> CardRange {
    CardRange::new(
        acs_id,
        AccountNumber::new(start).unwrap(),
        AccountNumber::new(end).unwrap(),
        ProtocolVersion::new(2, 1, 0),
        ProtocolVersion::new(2, 2, 0),
    )
}

/// An AReq as the originator sends it: only the originator's id (and the
/// device's, on the app channel) is set.
pub fn authentication_request(
    pan: &str,
    minor_units: &str,
    channel: DeviceChannel,
) -> AuthenticationRequest {
    let ids = TransactionIds::originated(Uuid::new_v4());
    let ids = match channel {
        DeviceChannel::App => ids.with_sdk(Some(Uuid::new_v4())),
        DeviceChannel::Browser => ids,
    };
    AuthenticationRequest {
        message_type: MessageType::AReq,
        message_version: ProtocolVersion::new(2, 2, 0),
        ids,
        server_ref_number: "3DS_SERVER_001".into(),
        server_url: "https://server.example".into(),
        requestor_id: "REQ_1".into(),
        requestor_name: "Merchant".into(),
        requestor_url: "https://merchant.example".into(),
        challenge_ind: None,
        requestor_app_url: None,
        comp_ind: None,
        acct_number: AccountNumber::new(pan).unwrap(),
        card_expiry_date: None,
        acquirer_bin: "400000".into(),
        acquirer_merchant_id: "M1".into(),
        mcc: "5411".into(),
        merchant_country_code: "840".into(),
        merchant_name: "Merchant".into(),
        device_channel: channel,
        message_category: MessageCategory::Payment,
        notification_url: None,
        purchase_amount: Some(minor_units.into()),
        purchase_currency: Some("840".into()),
        purchase_exponent: Some("2".into()),
        purchase_date: None,
        browser_accept_header: None,
        browser_ip: None,
        browser_language: None,
        browser_user_agent: None,
        sdk_app_id: None,
        sdk_max_timeout: None,
        sdk_reference_number: None,
        message_extension: None,
    }
}
