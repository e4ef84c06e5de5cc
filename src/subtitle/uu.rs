//! The UUEncode variant Aegisub uses for `[Fonts]` and `[Graphics]` payloads: no length
//! prefix, no padding characters, and lines wrapped at 80 characters.

use data_encoding_macro::new_encoding;

const UU: data_encoding::Encoding = new_encoding! {
    symbols: r##"!"#$%&'()*+,-./0123456789:;<=>?@ABCDEFGHIJKLMNOPQRSTUVWXYZ[\]^_`"##,
    padding: None,
};

/// Characters per line of encoded attachment data.
pub(crate) const LINE_LENGTH: usize = 80;

pub(crate) fn encode(input: &[u8]) -> String {
    // Encode whole 3-byte groups; the last group is zero-padded and then cut back to the
    // number of characters that carry data.
    let mut padded = input.to_vec();
    let remainder = padded.len() % 3;
    if remainder != 0 {
        padded.resize(padded.len() + 3 - remainder, 0);
    }

    let mut result = UU.encode(&padded);

    let blocks = input.len() / 3;
    let trail = input.len() % 3;
    result.truncate(blocks * 4 + if trail == 0 { 0 } else { trail + 1 });

    result
}

/// Encode and split into lines of at most [`LINE_LENGTH`] characters.
pub(crate) fn encode_lines(input: &[u8]) -> Vec<String> {
    let encoded = encode(input);
    encoded
        .as_bytes()
        .chunks(LINE_LENGTH)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect()
}

pub(crate) fn decode(input: &str) -> Result<Vec<u8>, data_encoding::DecodeError> {
    UU.decode(input.as_bytes())
}

/// Decode data that was split over several lines.
pub(crate) fn decode_lines<'a, I>(lines: I) -> Result<Vec<u8>, data_encoding::DecodeError>
where
    I: IntoIterator<Item = &'a str>,
{
    let joined: String = lines.into_iter().map(str::trim).collect();
    decode(&joined)
}
