//! Detection Injection Utility
//!
//! Publishes detection counts the way the object detector apps do, so a
//! running device can be exercised without a camera.
//!
//! ## Usage
//!
//! ```bash
//! # One person detected on the default detector feed
//! inject-detection --count 1
//!
//! # Nothing detected
//! inject-detection --count 0
//!
//! # A different detector and label
//! inject-detection --unique-id cam-2 --label dog --count 3
//!
//! # Raw payload, e.g. to check that garbage switches the LED off
//! inject-detection --payload abc
//!
//! # Toggle every two seconds, five times
//! inject-detection --count 1 --repeat 5 --interval-ms 2000 --alternate
//!
//! # Behave like the detector apps: announce the sensor and report availability
//! inject-detection --count 2 --discovery --availability
//! ```
//!
//! A value equal to the last one sent for the label is skipped, so
//! `--repeat` without `--alternate` sends once unless `--allow-repeats` is set.

use clap::Parser;
use detector_led::config::{DEFAULT_BROKER_PASSWORD, DEFAULT_BROKER_USERNAME, DEFAULT_CLIENT_ID};
use detector_led::publisher::{Availability, DetectionPublisher, OutboundMessage};
use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Outgoing, Packet, QoS};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::time::{sleep, timeout, Duration};

const DEFAULT_UNIQUE_ID: &str = "d6287655-7211-46b9-8fb2-1118f38512ed";

#[derive(Parser)]
#[command(
    name = "inject-detection",
    about = "Publish object detection counts to a detector-led device",
    long_about = "Publishes detection counts on an object detector topic.\nUseful for exercising a running device without a camera."
)]
struct Args {
    /// Detector unique id used in the topic
    #[arg(long, default_value = DEFAULT_UNIQUE_ID)]
    unique_id: String,

    /// Detection label used in the topic
    #[arg(long, default_value = "person")]
    label: String,

    /// Full topic, overrides --unique-id and --label (no discovery, no dedupe)
    #[arg(long, conflicts_with = "discovery")]
    topic: Option<String>,

    /// Number of detected objects to publish
    #[arg(long, conflicts_with = "payload")]
    count: Option<i64>,

    /// Raw payload text to publish instead of a count
    #[arg(long)]
    payload: Option<String>,

    /// Number of messages to publish
    #[arg(long, default_value = "1")]
    repeat: u32,

    /// Delay between repeated messages
    #[arg(long, default_value = "1000")]
    interval_ms: u64,

    /// Alternate between the count and 0 on repeats
    #[arg(long)]
    alternate: bool,

    /// Send values even when they repeat the last one for the label
    #[arg(long)]
    allow_repeats: bool,

    /// Publish a retained Home Assistant discovery config before the first value
    #[arg(long)]
    discovery: bool,

    /// Publish retained online/offline on the device availability topic
    #[arg(long)]
    availability: bool,

    /// Device id used in the availability topic
    #[arg(long, default_value = DEFAULT_CLIENT_ID)]
    device_id: String,

    /// MQTT broker host
    #[arg(long, default_value = "localhost")]
    broker_host: String,

    /// MQTT broker port
    #[arg(long, default_value = "1883")]
    broker_port: u16,

    /// Broker username
    #[arg(long, default_value = DEFAULT_BROKER_USERNAME)]
    username: String,

    /// Broker password
    #[arg(long, env = "MQTT_PASSWORD", default_value = DEFAULT_BROKER_PASSWORD)]
    password: String,
}

struct DetectionInjector {
    client: AsyncClient,
    event_loop: EventLoop,
}

impl DetectionInjector {
    async fn connect(args: &Args) -> Result<Self, Box<dyn std::error::Error>> {
        let client_id = format!(
            "inject-detection-{}",
            SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs()
        );

        let mut mqttoptions = MqttOptions::new(client_id, &args.broker_host, args.broker_port);
        mqttoptions.set_keep_alive(Duration::from_secs(60));
        mqttoptions.set_credentials(&args.username, &args.password);
        if args.availability {
            let offline = Availability::Offline.message(&args.device_id);
            mqttoptions.set_last_will(LastWill::new(
                offline.topic,
                offline.payload,
                QoS::AtLeastOnce,
                true,
            ));
        }

        let (client, mut event_loop) = AsyncClient::new(mqttoptions, 10);

        println!(
            "Connecting to MQTT broker {}:{}...",
            args.broker_host, args.broker_port
        );
        timeout(Duration::from_secs(10), async {
            loop {
                if let Event::Incoming(Packet::ConnAck(_)) = event_loop.poll().await? {
                    return Ok::<(), rumqttc::ConnectionError>(());
                }
            }
        })
        .await??;

        Ok(Self { client, event_loop })
    }

    /// Publish one message and drive the event loop until the broker acknowledged it
    async fn publish(&mut self, message: &OutboundMessage) -> Result<(), Box<dyn std::error::Error>> {
        self.client
            .publish(
                &message.topic,
                QoS::AtLeastOnce,
                message.retain,
                message.payload.as_bytes().to_vec(),
            )
            .await?;

        timeout(Duration::from_secs(5), async {
            loop {
                if let Event::Incoming(Packet::PubAck(_)) = self.event_loop.poll().await? {
                    return Ok::<(), rumqttc::ConnectionError>(());
                }
            }
        })
        .await??;

        let retained = if message.retain { " (retained)" } else { "" };
        println!("📤 {} → {}{retained}", message.payload, message.topic);
        Ok(())
    }

    async fn disconnect(mut self) {
        if self.client.disconnect().await.is_ok() {
            let _ = timeout(Duration::from_millis(500), async {
                while let Ok(event) = self.event_loop.poll().await {
                    if let Event::Outgoing(Outgoing::Disconnect) = event {
                        break;
                    }
                }
            })
            .await;
        }
    }
}

fn payload_for(args: &Args, index: u32) -> String {
    if let Some(raw) = &args.payload {
        return raw.clone();
    }
    let count = args.count.unwrap_or(1);
    if args.alternate && index % 2 == 1 {
        "0".to_string()
    } else {
        count.to_string()
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut publisher = DetectionPublisher::new(&args.unique_id)
        .with_discovery(args.discovery)
        .with_dedupe(!args.allow_repeats);

    let mut injector = match DetectionInjector::connect(&args).await {
        Ok(injector) => injector,
        Err(e) => {
            eprintln!("✗ Failed to connect: {e}");
            std::process::exit(1);
        }
    };

    let mut outcome = Ok(());
    if args.availability {
        outcome = injector
            .publish(&Availability::Online.message(&args.device_id))
            .await;
    }

    let mut sent = 0u32;
    for index in 0..args.repeat {
        if outcome.is_err() {
            break;
        }
        if index > 0 {
            sleep(Duration::from_millis(args.interval_ms)).await;
        }
        let payload = payload_for(&args, index);

        let messages = match &args.topic {
            Some(topic) => vec![OutboundMessage {
                topic: topic.clone(),
                payload: payload.clone(),
                retain: false,
            }],
            None => publisher.plan(&args.label, &payload)?,
        };
        if messages.is_empty() {
            println!("🔁 {}: repeated value ({payload}), skipped", args.label);
            continue;
        }

        for message in &messages {
            if let Err(e) = injector.publish(message).await {
                outcome = Err(e);
                break;
            }
        }
        sent += 1;
    }

    if args.availability && outcome.is_ok() {
        outcome = injector
            .publish(&Availability::Offline.message(&args.device_id))
            .await;
    }

    if let Err(e) = outcome {
        eprintln!("✗ Failed to publish detection: {e}");
        std::process::exit(1);
    }

    injector.disconnect().await;
    println!("✓ Published {sent} of {} value(s)", args.repeat);
    Ok(())
}
