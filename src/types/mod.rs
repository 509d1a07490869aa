//! Domain value types with their own wire mapping and schema type.

mod amount;
mod buckets;
mod external_id;
mod hash_id;
mod interval;
mod key_mixed;
mod keyed;
mod min_max;
mod mixed;
mod secure;
mod sets;
mod translations;

pub use amount::{Amount, MIXED_CURRENCY, sum_amounts};
pub use external_id::ExternalId;
pub use hash_id::HashId;
pub use interval::{Interval, IntervalType};
pub use key_mixed::KeyMixed;
pub use keyed::Keyed;
pub use min_max::MinMax;
pub use mixed::Mixed;
pub use secure::{
    AddressString, CountryString, DateOfBirthString, EmailString, IpAddressString, PersonNameString,
    PersonalString, PhoneString, SecureString, UrlString, VerifyString,
};
pub use sets::{IntSet, Set, SetElement, StringSet};
pub use translations::{Translation, Translations};
