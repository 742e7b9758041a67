//! Binary snapshot capability
//!
//! Types that cannot be expressed as JSON natives opt into recording by
//! implementing `Snapshot`. The codec stores the bytes in an opaque tagged
//! node and hands them back verbatim on restore. Reconstruction never runs
//! arbitrary code beyond `from_snapshot` itself.

use super::CodecError;

/// A value that can be snapshotted to bytes and rebuilt from them.
///
/// # Example
/// ```
/// use calltape::{CodecError, Snapshot};
///
/// struct Cursor {
///     offset: u64,
/// }
///
/// impl Snapshot for Cursor {
///     fn to_snapshot(&self) -> Result<Vec<u8>, CodecError> {
///         Ok(self.offset.to_le_bytes().to_vec())
///     }
///
///     fn from_snapshot(bytes: &[u8]) -> Result<Self, CodecError> {
///         let raw = <[u8; 8]>::try_from(bytes).map_err(|_| CodecError::Snapshot {
///             type_name: Self::type_name().to_string(),
///             detail: format!("expected 8 bytes, got {}", bytes.len()),
///         })?;
///         Ok(Cursor {
///             offset: u64::from_le_bytes(raw),
///         })
///     }
/// }
/// ```
pub trait Snapshot: Sized {
    /// Name written into the opaque node for diagnostics.
    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }

    fn to_snapshot(&self) -> Result<Vec<u8>, CodecError>;

    fn from_snapshot(bytes: &[u8]) -> Result<Self, CodecError>;
}
