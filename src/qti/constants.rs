/// Constant values related to QTI content packages.
///
/// This module contains namespace URIs, schema locations, resource type
/// strings and the attribute names that carry file references.

/// Well-known file name of the package manifest at the package root
pub const MANIFEST_FILENAME: &str = "imsmanifest.xml";

/// XML namespaces
pub mod namespace {
    /// Content packaging namespace used by 3.0 manifests
    pub const IMSCP_V3: &str = "http://www.imsglobal.org/xsd/qti/qtiv3p0/imscp_v1p1";
    /// Content packaging namespace used by 2.x manifests
    pub const IMSCP_V2: &str = "http://www.imsglobal.org/xsd/imscp_v1p1";
    /// Substring identifying any content packaging namespace
    pub const IMSCP_MARKER: &str = "imscp_v1p1";
    /// Metadata (LOM) extension namespace
    pub const IMSMD: &str = "http://ltsc.ieee.org/xsd/LOM";
    /// Prefix the metadata extension is bound to
    pub const IMSMD_PREFIX: &str = "imsmd";
    /// XML Schema instance namespace
    pub const XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
    /// QTI 3.0 assessment content namespace
    pub const QTI_V3: &str = "http://www.imsglobal.org/xsd/imsqtiasi_v3p0";
    /// MathML namespace
    pub const MATHML: &str = "http://www.w3.org/1998/Math/MathML";
    /// Substring identifying SSML namespaces
    pub const SSML_MARKER: &str = "ssml";
    /// XHTML namespace
    pub const XHTML: &str = "http://www.w3.org/1999/xhtml";
    /// Prefix used to hold a displaced default namespace during promotion
    pub const OLD_DEFAULT_PREFIX: &str = "olddefault";
}

/// Fixed `xsi:schemaLocation` value of a converted manifest
pub const MANIFEST_SCHEMA_LOCATION: &str = "http://www.imsglobal.org/xsd/qti/qtiv3p0/imscp_v1p1 \
https://purl.imsglobal.org/spec/qti/v3p0/schema/xsd/imsqtiv3p0_imscpv1p2_v1p0.xsd \
http://ltsc.ieee.org/xsd/LOM \
https://purl.imsglobal.org/spec/md/v1p3/schema/xsd/imsmd_loose_v1p3p2.xsd";

/// Resource type strings of a 3.0 manifest
pub mod resource_type {
    pub const ITEM: &str = "imsqti_item_xmlv3p0";
    pub const TEST: &str = "imsqti_test_xmlv3p0";
    pub const WEBCONTENT: &str = "webcontent";
    pub const ASSOCIATED_CONTENT: &str = "associatedcontent/learning-application-resource";
    pub const CONTROL_FILE: &str = "controlfile/xmlv1p0";
}

/// Response processing template referenced by items that only compare
/// against their correct response
pub const MATCH_CORRECT_TEMPLATE: &str =
    "https://purl.imsglobal.org/spec/qti/v3p0/rptemplates/match_correct.xml";

/// Attributes whose values are references to other files in the package
pub const REFERENCE_ATTRIBUTES: [&str; 6] = [
    "src",
    "href",
    "data",
    "primary-path",
    "fallback-path",
    "template-location",
];

/// Elements that wrap media and must be replaced as a whole when the
/// media they play is removed
pub const MEDIA_INTERACTIONS: [&str; 2] = ["qti-media-interaction", "mediaInteraction"];

/// Extensions of referenced files that are deleted without a placeholder
pub const NON_REPLACEABLE_EXTENSIONS: [&str; 4] = ["css", "xsd", "xsl", "dtd"];
