//! Unit tests for HCI packet handling

use crate::hci::constants::*;
use crate::hci::packet::{AclData, HciCommand, HciEvent, HciPacket};

#[test]
fn test_reset_command_packet() {
    let packet = HciCommand::Reset.to_packet();

    // type | opcode (0x0C03 LE) | param length
    assert_eq!(packet, vec![HCI_COMMAND_PKT, 0x03, 0x0C, 0x00]);
}

#[test]
fn test_advertising_parameters_packet() {
    let cmd = HciCommand::LeSetAdvertisingParameters {
        interval_min: 0x00A0,
        interval_max: 0x00A0,
        adv_type: 0x00,
        own_address_type: 0x00,
        channel_map: 0x07,
        filter_policy: 0x00,
    };
    let packet = cmd.to_packet();

    assert_eq!(packet[0], HCI_COMMAND_PKT);
    assert_eq!(
        u16::from_le_bytes([packet[1], packet[2]]),
        opcode(OGF_LE, OCF_LE_SET_ADVERTISING_PARAMETERS)
    );
    assert_eq!(packet[3], 15); // parameter length
    assert_eq!(&packet[4..6], &0x00A0u16.to_le_bytes()); // interval min
    assert_eq!(packet[8], 0x00); // ADV_IND
    assert_eq!(packet[17], 0x07); // channel map
}

#[test]
fn test_advertising_data_padded_to_31_bytes() {
    let cmd = HciCommand::LeSetAdvertisingData {
        data: vec![0x02, 0x01, 0x06],
    };
    let packet = cmd.to_packet();

    assert_eq!(packet[3], 32); // significant length byte + 31 data bytes
    assert_eq!(packet[4], 3); // significant length
    assert_eq!(&packet[5..8], &[0x02, 0x01, 0x06]);
    assert!(packet[8..36].iter().all(|&b| b == 0));
}

#[test]
fn test_advertising_enable_packet() {
    let packet = HciCommand::LeSetAdvertisingEnable { enable: true }.to_packet();
    assert_eq!(
        u16::from_le_bytes([packet[1], packet[2]]),
        opcode(OGF_LE, OCF_LE_SET_ADVERTISING_ENABLE)
    );
    assert_eq!(&packet[3..], &[0x01, 0x01]);
}

#[test]
fn test_event_parsing() {
    // Command Complete for Reset with status 0
    let opcode_bytes = opcode(OGF_HOST_CTL, OCF_RESET).to_le_bytes();
    let raw = vec![
        EVT_CMD_COMPLETE,
        4,
        1,
        opcode_bytes[0],
        opcode_bytes[1],
        0x00,
    ];

    let event = HciEvent::parse(&raw).unwrap();
    assert_eq!(event.event_code, EVT_CMD_COMPLETE);
    assert!(event.is_command_complete(opcode(OGF_HOST_CTL, OCF_RESET)));
    assert!(!event.is_command_complete(opcode(OGF_LE, OCF_LE_SET_ADVERTISING_ENABLE)));
    assert_eq!(event.command_status(), Some(0));
}

#[test]
fn test_event_parsing_rejects_truncated_input() {
    assert!(HciEvent::parse(&[EVT_CMD_COMPLETE]).is_none());
    assert!(HciEvent::parse(&[EVT_CMD_COMPLETE, 4, 1]).is_none());
}

#[test]
fn test_acl_round_trip() {
    let acl = AclData {
        handle: 0x0040,
        pb_flag: ACL_PB_FIRST_FLUSHABLE,
        bc_flag: 0,
        data: vec![0x03, 0x00, 0x04, 0x00, 0x12, 0x34, 0x56],
    };

    let packet = acl.to_packet();
    assert_eq!(packet[0], HCI_ACL_PKT);

    let parsed = AclData::parse(&packet[1..]).unwrap();
    assert_eq!(parsed.handle, 0x0040);
    assert_eq!(parsed.pb_flag, ACL_PB_FIRST_FLUSHABLE);
    assert_eq!(parsed.data, acl.data);
}

#[test]
fn test_acl_parse_rejects_short_payload() {
    // Header claims 10 bytes but only 2 follow
    let raw = [0x40, 0x20, 0x0A, 0x00, 0x01, 0x02];
    assert!(AclData::parse(&raw).is_none());
}

#[test]
fn test_packet_dispatch_by_type() {
    let event_raw = [HCI_EVENT_PKT, EVT_DISCONN_COMPLETE, 1, 0x00];
    assert!(matches!(
        HciPacket::parse(&event_raw),
        Some(HciPacket::Event(_))
    ));

    let acl_raw = [HCI_ACL_PKT, 0x40, 0x20, 0x01, 0x00, 0xAA];
    assert!(matches!(
        HciPacket::parse(&acl_raw),
        Some(HciPacket::AclData(_))
    ));

    assert!(HciPacket::parse(&[0x07, 0x00]).is_none());
}
