pub mod generator;
pub mod resolver;
pub mod secrets;
pub mod token;

pub use generator::{GeneratorError, HexGenerator, PasswordGenerator, SecretGenerator};
pub use resolver::{ResolveError, TokenResolver};
pub use secrets::{SecretExchange, SecretLookup, SecretsError};
pub use token::{AccessToken, Principal, Token, TokenKeyHint, TokenKind};
