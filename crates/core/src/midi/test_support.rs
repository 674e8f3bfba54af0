//! Byte-level SMF builder for test fixtures.

pub fn encode_var_len(mut value: u32) -> Vec<u8> {
    let mut bytes = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        bytes.push(((value & 0x7F) as u8) | 0x80);
        value >>= 7;
    }
    bytes.reverse();
    bytes
}

#[derive(Default)]
pub struct TrackBuilder {
    body: Vec<u8>,
}

impl TrackBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn event(mut self, delta: u32, bytes: &[u8]) -> Self {
        self.body.extend(encode_var_len(delta));
        self.body.extend_from_slice(bytes);
        self
    }

    pub fn note_on(self, delta: u32, channel: u8, note: u8, velocity: u8) -> Self {
        self.event(delta, &[0x90 | channel, note, velocity])
    }

    pub fn note_off(self, delta: u32, channel: u8, note: u8) -> Self {
        self.event(delta, &[0x80 | channel, note, 0x40])
    }

    /// Two data bytes with no status byte (running status).
    pub fn running(self, delta: u32, note: u8, velocity: u8) -> Self {
        self.event(delta, &[note, velocity])
    }

    pub fn control(self, delta: u32, channel: u8, controller: u8, value: u8) -> Self {
        self.event(delta, &[0xB0 | channel, controller, value])
    }

    pub fn program(self, delta: u32, channel: u8, program: u8) -> Self {
        self.event(delta, &[0xC0 | channel, program])
    }

    pub fn meta(self, delta: u32, meta_type: u8, payload: &[u8]) -> Self {
        let mut bytes = vec![0xFF, meta_type];
        bytes.extend(encode_var_len(payload.len() as u32));
        bytes.extend_from_slice(payload);
        self.event(delta, &bytes)
    }

    pub fn tempo(self, delta: u32, micros_per_quarter: u32) -> Self {
        let [_, a, b, c] = micros_per_quarter.to_be_bytes();
        self.meta(delta, 0x51, &[a, b, c])
    }

    pub fn name(self, delta: u32, name: &str) -> Self {
        self.meta(delta, 0x03, name.as_bytes())
    }

    pub fn sysex(self, delta: u32, payload: &[u8]) -> Self {
        let mut bytes = vec![0xF0];
        bytes.extend(encode_var_len(payload.len() as u32));
        bytes.extend_from_slice(payload);
        self.event(delta, &bytes)
    }

    pub fn end(self, delta: u32) -> Self {
        self.meta(delta, 0x2F, &[])
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(bytes);
        self
    }

    pub fn chunk(self) -> Vec<u8> {
        self.chunk_with_tag(b"MTrk")
    }

    pub fn chunk_with_tag(self, tag: &[u8; 4]) -> Vec<u8> {
        let mut bytes = tag.to_vec();
        bytes.extend((self.body.len() as u32).to_be_bytes());
        bytes.extend(self.body);
        bytes
    }
}

/// Header chunk followed by the given chunks.
pub fn smf(format: u16, division: u16, chunks: &[Vec<u8>]) -> Vec<u8> {
    let mut bytes = b"MThd".to_vec();
    bytes.extend(6u32.to_be_bytes());
    bytes.extend(format.to_be_bytes());
    bytes.extend((chunks.len() as u16).to_be_bytes());
    bytes.extend(division.to_be_bytes());
    for chunk in chunks {
        bytes.extend_from_slice(chunk);
    }
    bytes
}

/// One-quarter-note middle C at 480 ticks per quarter.
pub fn single_note_file() -> Vec<u8> {
    let track = TrackBuilder::new()
        .note_on(0, 0, 60, 100)
        .note_off(480, 0, 60)
        .end(0)
        .chunk();
    smf(0, 480, &[track])
}
