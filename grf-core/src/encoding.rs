//! Filename encoding classification.
//!
//! GRF archives store virtual paths in a legacy 8-bit encoding (EUC-KR).
//! Names read from a real filesystem may already be in that encoding, or be
//! Unicode that can be transcoded to it, or be neither.

use std::borrow::Cow;
use std::ffi::OsStr;

use encoding_rs::EUC_KR;

/// Transcoders between the archive's native 8-bit encoding and Unicode.
pub trait NativeCodec {
    /// Lossy: unmappable bytes decode to U+FFFD.
    fn decode_native_to_portable(&self, bytes: &[u8]) -> String;

    /// `None` when `text` has a character the native encoding cannot represent.
    fn encode_portable_to_native(&self, text: &str) -> Option<Vec<u8>>;
}

/// The GRF native encoding.
#[derive(Clone, Copy, Debug, Default)]
pub struct EucKr;

impl NativeCodec for EucKr {
    fn decode_native_to_portable(&self, bytes: &[u8]) -> String {
        let (text, _had_errors) = EUC_KR.decode_without_bom_handling(bytes);
        text.into_owned()
    }

    fn encode_portable_to_native(&self, text: &str) -> Option<Vec<u8>> {
        let (bytes, _, unmappable) = EUC_KR.encode(text);
        if unmappable {
            None
        } else {
            Some(bytes.into_owned())
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EncodingVerdict {
    /// Unicode name that transcodes to the native encoding.
    NativeUnicodeCompatible,
    /// Name already in single-byte range; taken as native bytes.
    ArchiveNativeCompatible,
    Unclassifiable,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classified {
    pub verdict: EncodingVerdict,
    /// Display form, used as the virtual segment.
    pub portable: String,
    /// Bytes to store in the archive.
    pub native: Vec<u8>,
}

/// Classify a raw filename.
///
/// The portable form is the UTF-8 reading of `raw` when valid, else one
/// Latin-1 char per byte. Rules, first match wins:
/// 1. no char above U+00FF: native bytes are `raw`, display is their decoding;
/// 2. the portable form encodes natively: keep it for display;
/// 3. unclassifiable.
///
/// A name valid under both readings always lands in rule 1.
pub fn classify(raw: &[u8], codec: &dyn NativeCodec) -> Classified {
    let portable: Cow<'_, str> = match std::str::from_utf8(raw) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => Cow::Owned(raw.iter().map(|&b| b as char).collect()),
    };

    if portable.chars().all(|c| (c as u32) <= 0xFF) {
        return Classified {
            verdict: EncodingVerdict::ArchiveNativeCompatible,
            portable: codec.decode_native_to_portable(raw),
            native: raw.to_vec(),
        };
    }

    match codec.encode_portable_to_native(&portable) {
        Some(native) => Classified {
            verdict: EncodingVerdict::NativeUnicodeCompatible,
            portable: portable.into_owned(),
            native,
        },
        None => Classified {
            verdict: EncodingVerdict::Unclassifiable,
            portable: portable.into_owned(),
            native: Vec::new(),
        },
    }
}

/// Raw bytes of a filesystem name.
#[cfg(unix)]
pub fn os_name_bytes(name: &OsStr) -> Cow<'_, [u8]> {
    use std::os::unix::ffi::OsStrExt;
    Cow::Borrowed(name.as_bytes())
}

/// Raw bytes of a filesystem name. Names that are not valid Unicode come back
/// with replacement chars, which the classifier then rejects.
#[cfg(not(unix))]
pub fn os_name_bytes(name: &OsStr) -> Cow<'_, [u8]> {
    match name.to_string_lossy() {
        Cow::Borrowed(s) => Cow::Borrowed(s.as_bytes()),
        Cow::Owned(s) => Cow::Owned(s.into_bytes()),
    }
}
