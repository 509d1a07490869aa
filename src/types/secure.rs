use std::fmt;
use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::core::{KnownType, Result, Value};
use crate::mapper::ValueMarshaler;
use crate::schema::{ExtendedType, ValueType};

/// Secret text paired with its displayable mask.
///
/// On write the original travels in `secure_text` and the mask in `text`.
/// Reads return only the mask unless the caller asked for decryption, in
/// which case the server fills `secure_text` again and sets the verify flag.
/// Plaintext without the flag is ignored.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecureString {
    original: String,
    masked: String,
}

impl SecureString {
    pub fn new(original: impl Into<String>, masked: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            masked: masked.into(),
        }
    }

    /// Masks every character except the last `visible` ones with `*`.
    pub fn masked_tail(original: impl Into<String>, visible: usize) -> Self {
        let original = original.into();
        let total = original.chars().count();
        let hidden = total.saturating_sub(visible);
        let masked = original
            .chars()
            .enumerate()
            .map(|(index, ch)| if index < hidden { '*' } else { ch })
            .collect();
        Self { original, masked }
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn masked(&self) -> &str {
        &self.masked
    }

    /// True when the plaintext is known, either set locally or decrypted.
    pub fn has_original(&self) -> bool {
        !self.original.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.original.is_empty() && self.masked.is_empty()
    }

    fn to_wire(&self) -> Value {
        Value {
            text: self.masked.clone(),
            secure_text: self.original.clone(),
            known_type: KnownType::SecureText,
            ..Value::default()
        }
    }

    fn read_wire(&mut self, value: &Value) {
        self.masked = value.text.clone();
        if value.bool && !value.secure_text.is_empty() {
            self.original = value.secure_text.clone();
        }
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureString")
            .field("masked", &self.masked)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked)
    }
}

impl ValueMarshaler for SecureString {
    fn marshal_value(&self) -> Result<Value> {
        Ok(self.to_wire())
    }

    fn unmarshal_value(&mut self, value: &Value) -> Result<()> {
        self.read_wire(value);
        Ok(())
    }

    fn value_type() -> ValueType {
        ValueType::of(KnownType::SecureText)
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

crate::value_field!(SecureString);

macro_rules! classified_secure_string {
    ($($(#[$meta:meta])* $name:ident => $extended:expr),+ $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
            pub struct $name(pub SecureString);

            impl $name {
                pub fn new(original: impl Into<String>, masked: impl Into<String>) -> Self {
                    Self(SecureString::new(original, masked))
                }

                pub const fn extended_type() -> ExtendedType {
                    $extended
                }
            }

            impl Deref for $name {
                type Target = SecureString;

                fn deref(&self) -> &SecureString {
                    &self.0
                }
            }

            impl DerefMut for $name {
                fn deref_mut(&mut self) -> &mut SecureString {
                    &mut self.0
                }
            }

            impl From<SecureString> for $name {
                fn from(value: SecureString) -> Self {
                    Self(value)
                }
            }

            impl fmt::Debug for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.debug_tuple(stringify!($name)).field(&self.0).finish()
                }
            }

            impl ValueMarshaler for $name {
                fn marshal_value(&self) -> Result<Value> {
                    Ok(self.0.to_wire())
                }

                fn unmarshal_value(&mut self, value: &Value) -> Result<()> {
                    self.0.read_wire(value);
                    Ok(())
                }

                fn value_type() -> ValueType {
                    ValueType::extended(KnownType::SecureText, $extended)
                }

                fn is_zero(&self) -> bool {
                    self.0.is_empty()
                }
            }

            crate::value_field!($name);
        )+
    };
}

classified_secure_string! {
    /// Secure text holding personal data.
    PersonalString => ExtendedType::Personal,
    EmailString => ExtendedType::Email,
    PhoneString => ExtendedType::Phone,
    PersonNameString => ExtendedType::PersonName,
    IpAddressString => ExtendedType::IpAddress,
    CountryString => ExtendedType::Country,
    UrlString => ExtendedType::Url,
    AddressString => ExtendedType::Address,
    DateOfBirthString => ExtendedType::DateOfBirth,
}

/// Write-only candidate checked a secret against the stored value.
///
/// The candidate travels in `secure_text`; a read only reports whether the
/// server matched it.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerifyString {
    candidate: String,
    verified: bool,
}

impl VerifyString {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            verified: false,
        }
    }

    pub fn verified(&self) -> bool {
        self.verified
    }
}

impl fmt::Debug for VerifyString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifyString")
            .field("verified", &self.verified)
            .finish_non_exhaustive()
    }
}

impl ValueMarshaler for VerifyString {
    fn marshal_value(&self) -> Result<Value> {
        Ok(Value {
            secure_text: self.candidate.clone(),
            known_type: KnownType::VerifyText,
            ..Value::default()
        })
    }

    fn unmarshal_value(&mut self, value: &Value) -> Result<()> {
        self.verified = value.bool;
        Ok(())
    }

    fn value_type() -> ValueType {
        ValueType::of(KnownType::VerifyText)
    }

    fn is_zero(&self) -> bool {
        self.candidate.is_empty()
    }
}

crate::value_field!(VerifyString);
