// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Decoding of the text files the server writes. The server emits its
//! configuration, results and logs as UTF-16 (usually little-endian, not
//! always with a byte order mark), while files we write ourselves are UTF-8.

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Encoding {
    Utf8,
    Utf16Le,
    Utf16Be,
}

/// Decode a file's bytes into a string, detecting UTF-16 either by its byte
/// order mark or by the zero bytes interleaved with ASCII text.
pub fn decode_text(bytes: &[u8]) -> String {
    let (encoding, body) = sniff(bytes);
    match encoding {
        Encoding::Utf8 => String::from_utf8_lossy(body).into_owned(),
        Encoding::Utf16Le => decode_utf16(body, u16::from_le_bytes),
        Encoding::Utf16Be => decode_utf16(body, u16::from_be_bytes),
    }
}

fn sniff(bytes: &[u8]) -> (Encoding, &[u8]) {
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return (Encoding::Utf16Le, rest);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return (Encoding::Utf16Be, rest);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return (Encoding::Utf8, rest);
    }
    // Without a BOM, look at the first few code units: ASCII text in UTF-16
    // has a zero in every other byte.
    let sample = &bytes[..bytes.len().min(64)];
    if sample.len() >= 2 {
        let pairs = sample.len() / 2;
        let zero_odd = sample.iter().skip(1).step_by(2).filter(|b| **b == 0).count();
        let zero_even = sample.iter().step_by(2).take(pairs).filter(|b| **b == 0).count();
        if zero_odd * 2 > pairs && zero_even == 0 {
            return (Encoding::Utf16Le, bytes);
        }
        if zero_even * 2 > pairs && zero_odd == 0 {
            return (Encoding::Utf16Be, bytes);
        }
    }
    (Encoding::Utf8, bytes)
}

fn decode_utf16(body: &[u8], unit: fn([u8; 2]) -> u16) -> String {
    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|pair| unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16le(s: &str, bom: bool) -> Vec<u8> {
        let mut out = Vec::new();
        if bom {
            out.extend_from_slice(&[0xFF, 0xFE]);
        }
        for unit in s.encode_utf16() {
            out.extend_from_slice(&unit.to_le_bytes());
        }
        out
    }

    #[test]
    fn test_plain_utf8() {
        assert_eq!(decode_text(b"{\"tcpPort\": 9600}"), "{\"tcpPort\": 9600}");
    }

    #[test]
    fn test_utf8_bom_is_stripped() {
        assert_eq!(decode_text(b"\xEF\xBB\xBFhello"), "hello");
    }

    #[test]
    fn test_utf16le_with_bom() {
        let bytes = utf16le("Server started\r\nLap 1", true);
        assert_eq!(decode_text(&bytes), "Server started\r\nLap 1");
    }

    #[test]
    fn test_utf16le_without_bom() {
        let bytes = utf16le("{\"trackName\": \"monza\"}", false);
        assert_eq!(decode_text(&bytes), "{\"trackName\": \"monza\"}");
    }

    #[test]
    fn test_utf16be_with_bom() {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in "Kyalami".encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        assert_eq!(decode_text(&bytes), "Kyalami");
    }

    #[test]
    fn test_non_ascii_utf16() {
        let bytes = utf16le("Nürburgring", true);
        assert_eq!(decode_text(&bytes), "Nürburgring");
    }

    #[test]
    fn test_empty() {
        assert_eq!(decode_text(b""), "");
    }
}
