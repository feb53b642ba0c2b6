use crate::rational::Rational;

/**
    An encoded packet.

    Timestamps are expressed in whatever time base the producer uses; call
    [`Packet::rescale`] before handing a packet to a consumer with a
    different time base.
*/
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Packet {
    /// Compressed payload.
    pub data: Vec<u8>,
    /// Presentation timestamp.
    pub pts: Option<i64>,
    /// Decode timestamp.
    pub dts: Option<i64>,
    /// Duration in time-base units (zero when unknown).
    pub duration: i64,
    /// Index of the output stream this packet belongs to.
    pub stream_index: usize,
    /// True if the packet starts a decodable group of pictures.
    pub is_keyframe: bool,
}

impl Packet {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    /**
        Rescale timestamps and duration from one time base to another.
    */
    pub fn rescale(&mut self, from: Rational, to: Rational) {
        self.pts = self.pts.map(|pts| Rational::rescale(pts, from, to));
        self.dts = self.dts.map(|dts| Rational::rescale(dts, from, to));
        self.duration = Rational::rescale(self.duration, from, to);
    }
}

impl std::fmt::Debug for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packet")
            .field("size", &self.data.len())
            .field("pts", &self.pts)
            .field("dts", &self.dts)
            .field("duration", &self.duration)
            .field("stream_index", &self.stream_index)
            .field("is_keyframe", &self.is_keyframe)
            .finish()
    }
}
