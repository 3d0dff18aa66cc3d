//! Pure event routing for the MQTT session
//!
//! Every event the client yields is classified here before the session acts
//! on it, so the I/O side only deals with a small closed set of routes.

use rumqttc::{Event, Packet, SubscribeReasonCode};

/// Pure routing decisions based on MQTT events
pub struct MessageHandler;

impl MessageHandler {
    /// Route MQTT event to the appropriate handling (pure routing decision)
    pub fn route_mqtt_event(event: &Event) -> EventRoute {
        match event {
            Event::Incoming(incoming) => match incoming {
                Packet::ConnAck(_) => EventRoute::ConnectionAcknowledged,
                Packet::Publish(publish) => EventRoute::MessageReceived {
                    topic: publish.topic.clone(),
                    payload: publish.payload.clone(),
                },
                Packet::Disconnect => EventRoute::Disconnected,
                Packet::SubAck(suback) => EventRoute::SubscriptionConfirmed {
                    granted: Self::subscription_granted(&suback.return_codes),
                },
                other => EventRoute::InfrastructureEvent(format!("{other:?}")),
            },
            Event::Outgoing(_) => EventRoute::OutgoingEvent,
        }
    }

    /// True when every requested filter was granted (pure function)
    pub fn subscription_granted(return_codes: &[SubscribeReasonCode]) -> bool {
        !return_codes.is_empty()
            && return_codes
                .iter()
                .all(|code| matches!(code, SubscribeReasonCode::Success(_)))
    }
}

/// Routing decisions for MQTT events
#[derive(Debug, Clone)]
pub enum EventRoute {
    /// Connection acknowledged
    ConnectionAcknowledged,
    /// Message received on the subscribed topic
    MessageReceived {
        topic: String,
        payload: bytes::Bytes,
    },
    /// Broker closed the session
    Disconnected,
    /// SubAck received
    SubscriptionConfirmed { granted: bool },
    /// Infrastructure event (PingResp, etc.)
    InfrastructureEvent(String),
    /// Outgoing event (handled automatically)
    OutgoingEvent,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::{ConnAck, ConnectReturnCode, Outgoing, Publish, QoS, SubAck};

    #[test]
    fn test_route_connack() {
        let connack = Event::Incoming(Packet::ConnAck(ConnAck {
            session_present: false,
            code: ConnectReturnCode::Success,
        }));
        assert!(matches!(
            MessageHandler::route_mqtt_event(&connack),
            EventRoute::ConnectionAcknowledged
        ));
    }

    #[test]
    fn test_route_disconnect() {
        let disconnect = Event::Incoming(Packet::Disconnect);
        assert!(matches!(
            MessageHandler::route_mqtt_event(&disconnect),
            EventRoute::Disconnected
        ));
    }

    #[test]
    fn test_route_publish() {
        let publish = Event::Incoming(Packet::Publish(Publish::new(
            "aha/object_detector/x/person/stat_t",
            QoS::AtMostOnce,
            b"2".to_vec(),
        )));

        match MessageHandler::route_mqtt_event(&publish) {
            EventRoute::MessageReceived { topic, payload } => {
                assert_eq!(topic, "aha/object_detector/x/person/stat_t");
                assert_eq!(payload.as_ref(), b"2");
            }
            other => panic!("Expected MessageReceived route, got {other:?}"),
        }
    }

    #[test]
    fn test_route_suback() {
        let granted = Event::Incoming(Packet::SubAck(SubAck::new(
            1,
            vec![SubscribeReasonCode::Success(QoS::AtMostOnce)],
        )));
        assert!(matches!(
            MessageHandler::route_mqtt_event(&granted),
            EventRoute::SubscriptionConfirmed { granted: true }
        ));

        let refused = Event::Incoming(Packet::SubAck(SubAck::new(
            2,
            vec![SubscribeReasonCode::Failure],
        )));
        assert!(matches!(
            MessageHandler::route_mqtt_event(&refused),
            EventRoute::SubscriptionConfirmed { granted: false }
        ));
    }

    #[test]
    fn test_route_infrastructure_and_outgoing() {
        let ping = Event::Incoming(Packet::PingResp);
        assert!(matches!(
            MessageHandler::route_mqtt_event(&ping),
            EventRoute::InfrastructureEvent(_)
        ));

        let outgoing = Event::Outgoing(Outgoing::PingReq);
        assert!(matches!(
            MessageHandler::route_mqtt_event(&outgoing),
            EventRoute::OutgoingEvent
        ));
    }

    #[test]
    fn test_subscription_granted() {
        assert!(MessageHandler::subscription_granted(&[
            SubscribeReasonCode::Success(QoS::AtMostOnce)
        ]));
        assert!(!MessageHandler::subscription_granted(&[
            SubscribeReasonCode::Success(QoS::AtMostOnce),
            SubscribeReasonCode::Failure,
        ]));
        assert!(!MessageHandler::subscription_granted(&[]));
    }
}
