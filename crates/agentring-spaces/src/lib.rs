//! Action and observation space descriptors plus the JSON codec used to move
//! values across a process boundary.

pub mod codec;
pub mod error;
mod numeric;
pub mod serde_float;
pub mod space;
pub mod value;

pub use codec::{decode, decode_at, encode, encode_at};
pub use error::{Result, SpaceError};
pub use space::{BoxSpace, DEFAULT_BOX_DTYPE, Space, SpaceKind};
pub use value::SpaceValue;
