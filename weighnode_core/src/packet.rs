//! Radio frame codec: one id byte followed by an ASCII `key=value[,key=value]`
//! payload, no terminator.

use crate::config::LiquidCfg;
use crate::error::NodeError;

/// Reference radio payload limit, id byte included.
pub const MAX_PAYLOAD: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: u8,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn new(id: u8, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            payload: payload.into(),
        }
    }

    /// Payload as text; non-UTF-8 bytes are a malformed packet.
    pub fn payload_text(&self) -> Result<&str, NodeError> {
        std::str::from_utf8(&self.payload)
            .map_err(|e| NodeError::MalformedPacket(format!("payload is not text: {e}")))
    }

    /// Serialize, rejecting frames longer than `max_frame` bytes.
    pub fn to_bytes(&self, max_frame: usize) -> Result<Vec<u8>, NodeError> {
        let len = 1 + self.payload.len();
        if len > max_frame {
            return Err(NodeError::PayloadTooLarge {
                len,
                max: max_frame,
            });
        }
        let mut out = Vec::with_capacity(len);
        out.push(self.id);
        out.extend_from_slice(&self.payload);
        Ok(out)
    }
}

/// Frame `text` behind `id`, bounded by `max_frame` bytes in total.
pub fn encode(id: u8, text: &str, max_frame: usize) -> Result<Vec<u8>, NodeError> {
    Packet::new(id, text.as_bytes()).to_bytes(max_frame)
}

/// Split a frame into id and payload. An empty frame is malformed.
pub fn decode(bytes: &[u8]) -> Result<Packet, NodeError> {
    match bytes.split_first() {
        Some((&id, rest)) => Ok(Packet::new(id, rest)),
        None => Err(NodeError::MalformedPacket("empty frame".into())),
    }
}

/// `weight - container_baseline_g > increment_g`.
#[inline]
pub fn liquid_detected(weight: f32, liquid: &LiquidCfg) -> bool {
    weight - liquid.container_baseline_g > liquid.increment_g
}

/// The one payload this node sends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightReport {
    pub weight: f32,
    pub liquid_detected: bool,
}

impl WeightReport {
    pub fn new(weight: f32, liquid: &LiquidCfg) -> Self {
        Self {
            weight,
            liquid_detected: liquid_detected(weight, liquid),
        }
    }

    /// `weight=<3 decimals>,liquid_detected=<true|false>`
    pub fn to_payload(&self) -> String {
        format!(
            "weight={:.3},liquid_detected={}",
            self.weight, self.liquid_detected
        )
    }

    /// Parse a report payload. Both keys are required; unknown keys are
    /// ignored so newer senders can add fields.
    pub fn parse(text: &str) -> Result<Self, NodeError> {
        let mut weight = None;
        let mut liquid = None;
        for field in text.split(',') {
            let (key, value) = field
                .split_once('=')
                .ok_or_else(|| NodeError::MalformedPacket(format!("field without '=': {field:?}")))?;
            match key.trim() {
                "weight" => {
                    let w: f32 = value.trim().parse().map_err(|_| {
                        NodeError::MalformedPacket(format!("bad weight value: {value:?}"))
                    })?;
                    if !w.is_finite() {
                        return Err(NodeError::MalformedPacket("weight is not finite".into()));
                    }
                    weight = Some(w);
                }
                "liquid_detected" => {
                    liquid = Some(match value.trim() {
                        "true" => true,
                        "false" => false,
                        other => {
                            return Err(NodeError::MalformedPacket(format!(
                                "bad liquid_detected value: {other:?}"
                            )));
                        }
                    });
                }
                _ => {}
            }
        }
        match (weight, liquid) {
            (Some(weight), Some(liquid_detected)) => Ok(Self {
                weight,
                liquid_detected,
            }),
            (None, _) => Err(NodeError::MalformedPacket("missing weight".into())),
            (_, None) => Err(NodeError::MalformedPacket("missing liquid_detected".into())),
        }
    }
}
