//! Distinguished-name attribute OIDs and the names they are stored under.

/// Known attribute types, dotted OID to attribute name.
pub const ATTRIBUTE_NAMES: &[(&str, &str)] = &[
    ("2.5.4.3", "commonName"),
    ("2.5.4.4", "surname"),
    ("2.5.4.5", "serialNumber"),
    ("2.5.4.6", "countryName"),
    ("2.5.4.7", "localityName"),
    ("2.5.4.8", "stateOrProvinceName"),
    ("2.5.4.9", "streetAddress"),
    ("2.5.4.10", "organizationName"),
    ("2.5.4.11", "organizationalUnitName"),
    ("2.5.4.12", "title"),
    ("2.5.4.15", "businessCategory"),
    ("2.5.4.17", "postalCode"),
    ("2.5.4.42", "givenName"),
    ("1.2.840.113549.1.9.1", "emailAddress"),
    ("0.9.2342.19200300.100.1.25", "domainComponent"),
    ("1.3.6.1.4.1.311.60.2.1.3", "jurisdictionCountryName"),
];

pub const COMMON_NAME: &str = "commonName";

/// Public key algorithm identifiers
pub const RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
pub const DSA: &str = "1.2.840.10040.4.1";
pub const EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";

/// Named curves as raw OID content bytes, with their name and field size.
pub const NAMED_CURVES: &[(&[u8], &str, u32)] = &[
    (&[0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x03, 0x01, 0x07], "secp256r1", 256),
    (&[0x2B, 0x81, 0x04, 0x00, 0x22], "secp384r1", 384),
    (&[0x2B, 0x81, 0x04, 0x00, 0x23], "secp521r1", 521),
    (&[0x2B, 0x81, 0x04, 0x00, 0x0A], "secp256k1", 256),
];

/// Name under which an attribute is stored; unknown OIDs keep their dotted form.
pub fn attribute_name(oid: &str) -> String {
    ATTRIBUTE_NAMES
        .iter()
        .find(|(known, _)| *known == oid)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| oid.to_string())
}

pub fn named_curve(oid_bytes: &[u8]) -> Option<(&'static str, u32)> {
    NAMED_CURVES
        .iter()
        .find(|(bytes, _, _)| *bytes == oid_bytes)
        .map(|(_, name, bits)| (*name, *bits))
}
