//! Key-bag resolution from the metadata graph.

use aff4_crypto::{CertificateKeyBag, KeyBag, PasswordKeyBag};
use snafu::{OptionExt, ResultExt};

use crate::error::{
    DecodePropertySnafu, MissingKeyBagPropertySnafu, Result, UnknownKeyBagTypeSnafu,
};
use crate::properties::{Properties, lexicon};

/// Resolves the key bag declared by `resource`, constructing the variant
/// selected by the resource's type discriminator.
///
/// Fails with a not-found error when the discriminator is absent or
/// unrecognized, and with a decode error when a hex-encoded field is
/// malformed.
pub fn resolve(resource: &str, properties: &dyn Properties) -> Result<KeyBag> {
    let kind = properties
        .resource(resource, lexicon::RDF_TYPE)
        .context(UnknownKeyBagTypeSnafu { resource })?;

    match kind.as_str() {
        lexicon::PASSWORD_WRAPPED_KEY_BAG => resolve_password(resource, properties),
        lexicon::CERT_WRAPPED_KEY_BAG => resolve_certificate(resource, properties),
        _ => UnknownKeyBagTypeSnafu { resource }.fail(),
    }
}

fn resolve_password(resource: &str, properties: &dyn Properties) -> Result<KeyBag> {
    let salt = hex_property(resource, lexicon::SALT, properties)?;
    let iterations = int_property(resource, lexicon::ITERATIONS, properties)?;
    let key_size = int_property(resource, lexicon::KEY_SIZE_IN_BYTES, properties)?;
    let wrapped_key = hex_property(resource, lexicon::WRAPPED_KEY, properties)?;

    Ok(KeyBag::Password(PasswordKeyBag::new(
        salt,
        iterations as u32,
        key_size as usize,
        wrapped_key,
    )))
}

fn resolve_certificate(resource: &str, properties: &dyn Properties) -> Result<KeyBag> {
    let subject_name = string_property(resource, lexicon::X509_SUBJECT_NAME, properties)?;
    let serial_number = string_property(resource, lexicon::SERIAL_NUMBER, properties)?;
    let key_size = int_property(resource, lexicon::KEY_SIZE_IN_BYTES, properties)?;
    let wrapped_key = hex_property(resource, lexicon::WRAPPED_KEY, properties)?;

    Ok(KeyBag::Certificate(CertificateKeyBag::new(
        subject_name,
        serial_number,
        key_size as usize,
        wrapped_key,
    )))
}

fn string_property(
    resource: &str,
    property: &'static str,
    properties: &dyn Properties,
) -> Result<String> {
    properties
        .string(resource, property)
        .context(MissingKeyBagPropertySnafu { resource, property })
}

fn int_property(
    resource: &str,
    property: &'static str,
    properties: &dyn Properties,
) -> Result<i32> {
    properties
        .int(resource, property)
        .context(MissingKeyBagPropertySnafu { resource, property })
}

fn hex_property(
    resource: &str,
    property: &'static str,
    properties: &dyn Properties,
) -> Result<Vec<u8>> {
    let value = string_property(resource, property, properties)?;
    hex::decode(value.trim()).context(DecodePropertySnafu { resource, property })
}
