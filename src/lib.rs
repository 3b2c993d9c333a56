pub mod bitstream;
pub mod cancel;
pub mod capacity;
pub mod carrier;
pub mod config;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod video;

pub use cancel::CancelToken;
pub use carrier::{AudioCarrier, Carrier, CarrierKind, ChannelOrder, ElementSequence, ImageCarrier};
pub use config::{StegConfig, Strategy};
pub use engine::{decode, encode, EncodeReport};
pub use error::{Result, StegoError};
pub use pipeline::decode::decode_file;
pub use pipeline::encode::encode_file;
pub use pipeline::{capacity_of_file, roundtrip, CapacityReport, RoundtripResult};
