use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SPECIAL: &[u8] = b"!@#$%^&*()";

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Random source failure: {0}")]
    Rng(#[from] rand::Error),
}

/// Produces the random strings used as handshake secrets
pub trait SecretGenerator: Send + Sync {
    fn generate(&self) -> Result<String, GeneratorError>;
}

/// Password-style secrets drawn from letters, digits and optionally symbols
#[derive(Debug, Clone)]
pub struct PasswordGenerator {
    pub length: usize,
    pub special_chars: bool,
}

impl Default for PasswordGenerator {
    fn default() -> Self {
        Self {
            length: 12,
            special_chars: true,
        }
    }
}

impl PasswordGenerator {
    fn charset(&self) -> Vec<u8> {
        let mut chars = ALPHANUMERIC.to_vec();
        if self.special_chars {
            chars.extend_from_slice(SPECIAL);
        }
        chars
    }
}

impl SecretGenerator for PasswordGenerator {
    fn generate(&self) -> Result<String, GeneratorError> {
        let charset = self.charset();
        // Largest multiple of the charset size that fits in a byte; bytes
        // at or above it are rejected so every character is equally likely.
        let limit = 256 - (256 % charset.len());

        let mut out = String::with_capacity(self.length);
        let mut buf = [0u8; 64];
        while out.len() < self.length {
            OsRng.try_fill_bytes(&mut buf)?;
            for &byte in buf.iter() {
                if (byte as usize) < limit {
                    out.push(charset[byte as usize % charset.len()] as char);
                    if out.len() == self.length {
                        break;
                    }
                }
            }
        }
        Ok(out)
    }
}

/// Hex-encoded random bytes, cut to exactly `length` characters
#[derive(Debug, Clone)]
pub struct HexGenerator {
    pub length: usize,
}

impl Default for HexGenerator {
    fn default() -> Self {
        Self { length: 64 }
    }
}

impl SecretGenerator for HexGenerator {
    fn generate(&self) -> Result<String, GeneratorError> {
        let mut bytes = vec![0u8; self.length.div_ceil(2)];
        OsRng.try_fill_bytes(&mut bytes)?;
        let mut out = hex::encode(bytes);
        out.truncate(self.length);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_generator_length_and_charset() {
        let generator = PasswordGenerator {
            length: 40,
            special_chars: false,
        };
        let secret = generator.generate().unwrap();
        assert_eq!(secret.len(), 40);
        assert!(secret.bytes().all(|b| ALPHANUMERIC.contains(&b)));

        // Ensure randomness
        assert_ne!(secret, generator.generate().unwrap());
    }

    #[test]
    fn test_password_generator_default_uses_symbols_charset() {
        let generator = PasswordGenerator::default();
        let secret = generator.generate().unwrap();
        assert_eq!(secret.len(), 12);
        assert!(secret
            .bytes()
            .all(|b| ALPHANUMERIC.contains(&b) || SPECIAL.contains(&b)));
    }

    #[test]
    fn test_hex_generator() {
        let secret = HexGenerator::default().generate().unwrap();
        assert_eq!(secret.len(), 64);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hex_generator_odd_length() {
        let secret = HexGenerator { length: 13 }.generate().unwrap();
        assert_eq!(secret.len(), 13);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
