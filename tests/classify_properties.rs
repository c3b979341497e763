//! Property-based tests for the frame classifier, using `proptest` to
//! generate arbitrary well-formed and arbitrary malformed inputs and assert
//! the invariants the classifier promises to hold for all of them, rather
//! than a fixed table of examples.

use bytes::Bytes;
use proptest::prelude::*;

use framewire::protocol::classify::{classify, Disposition, ProtocolVariant};
use framewire::protocol::frame_wire::{Frame, Framelet, FrameletType};
use framewire::protocol::header::{Header, PayloadType};

fn arb_method_name() -> impl Strategy<Value = String> {
    "[a-z]{1,16}(\\.[a-z]{1,16}){0,3}"
}

fn arb_payload_type() -> impl Strategy<Value = PayloadType> {
    prop_oneof![Just(PayloadType::Request), Just(PayloadType::Response), Just(PayloadType::Event)]
}

proptest! {
    /// Any well-formed request/response frame under the rich variant always
    /// classifies to a deliver-style disposition, never an error one, and
    /// the payload bytes that come back are exactly the ones that went in.
    #[test]
    fn well_formed_frames_always_classify_without_error(
        request_id in any::<u32>(),
        method in arb_method_name(),
        payload_type in arb_payload_type(),
        payload in proptest::collection::vec(any::<u8>(), 0..256),
    ) {
        let header = Header { request_id, payload_type, method_name: method, error_code: 0 };
        let frame = Frame::new(vec![
            Framelet::new(FrameletType::Headers, header.encode()),
            Framelet::new(FrameletType::PayloadData, Bytes::from(payload.clone())),
        ]);
        let result = classify(Some(&frame), ProtocolVariant::Rich);

        prop_assert!(matches!(
            result.disposition,
            Disposition::DeliverRequestToService | Disposition::DeliverResponseToProxy | Disposition::DeliverEventToService
        ));
        prop_assert_eq!(result.payload.unwrap(), Bytes::from(payload));
    }

    /// Truncating a well-formed frame to just its `Headers` framelet (i.e.
    /// dropping the mandatory payload) always yields a malformed-data
    /// protocol error, never a panic and never a successful classification.
    #[test]
    fn a_frame_missing_its_payload_framelet_is_always_malformed(
        method in arb_method_name(),
        payload_type in arb_payload_type(),
    ) {
        let header = Header { request_id: 1, payload_type, method_name: method, error_code: 0 };
        let frame = Frame::new(vec![Framelet::new(FrameletType::Headers, header.encode())]);
        let result = classify(Some(&frame), ProtocolVariant::Rich);
        prop_assert_eq!(result.disposition, Disposition::SendProtocolError);
    }

    /// Arbitrary garbage bytes as the sole framelet's contents, tagged as
    /// `Headers`, never classify successfully.
    #[test]
    fn garbage_header_bytes_never_classify_successfully(garbage in proptest::collection::vec(any::<u8>(), 0..64)) {
        let frame = Frame::new(vec![
            Framelet::new(FrameletType::Headers, Bytes::from(garbage)),
            Framelet::new(FrameletType::PayloadData, Bytes::new()),
        ]);
        let result = classify(Some(&frame), ProtocolVariant::Rich);
        prop_assert_ne!(
            result.disposition,
            Disposition::DeliverRequestToService
        );
        prop_assert_ne!(result.disposition, Disposition::DeliverResponseToProxy);
        prop_assert_ne!(result.disposition, Disposition::DeliverEventToService);
    }

    /// Classifying is deterministic: running the same frame through twice
    /// always produces the same disposition.
    #[test]
    fn classification_is_deterministic(
        method in arb_method_name(),
        payload_type in arb_payload_type(),
        payload in proptest::collection::vec(any::<u8>(), 0..128),
    ) {
        let header = Header { request_id: 3, payload_type, method_name: method, error_code: 0 };
        let frame = Frame::new(vec![
            Framelet::new(FrameletType::Headers, header.encode()),
            Framelet::new(FrameletType::PayloadData, Bytes::from(payload)),
        ]);
        let first = classify(Some(&frame), ProtocolVariant::Rich);
        let second = classify(Some(&frame), ProtocolVariant::Rich);
        prop_assert_eq!(first, second);
    }
}
