//! Module containing the manifest analysis logic.


use anyhow::{anyhow, bail, Context, Result};
use axmldecoder::{Element, Node};
use quick_xml::{
    events::{attributes::Attributes, Event},
    Reader,
};
use std::{collections::BTreeSet, str};

/// Chunk type of a compiled XML document, little endian.
const RES_XML_TYPE: [u8; 2] = [0x03, 0x00];

/// Prefix shared by all the permissions defined by the Android platform.
pub const PLATFORM_PERMISSION_PREFIX: &str = "android.permission.";

/// Manifest analysis representation structure.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Manifest {
    package: String,
    version_name: String,
    version_code: Option<String>,
    permissions: BTreeSet<String>,
}

impl Manifest {
    /// Loads the given `AndroidManifest.xml` contents.
    ///
    /// Both the compiled binary XML found inside packages and plain text XML are accepted.
    pub fn load(bytes: &[u8]) -> Result<Self> {
        if bytes.len() >= 8 && bytes[..2] == RES_XML_TYPE {
            Self::from_binary(bytes)
        } else {
            let code = str::from_utf8(bytes)
                .context("the manifest is neither binary XML nor UTF-8 text")?;
            Self::from_text(code)
        }
    }

    /// Loads a compiled binary XML manifest.
    pub fn from_binary(bytes: &[u8]) -> Result<Self> {
        let document =
            axmldecoder::parse(bytes).map_err(|e| anyhow!("invalid binary XML: {:?}", e))?;
        let root = match document.get_root() {
            Some(Node::Element(root)) if root.get_tag() == "manifest" => root,
            _ => bail!("no <manifest> element found"),
        };

        let mut manifest = Self::default();
        for (key, value) in root.get_attributes() {
            match local_name(key) {
                "package" => manifest.set_package(value.as_str()),
                "versionCode" => manifest.set_version_code(value.as_str()),
                "versionName" => manifest.set_version_name(value.as_str()),
                _ => {}
            }
        }
        manifest.collect_binary_permissions(root);
        Ok(manifest)
    }

    fn collect_binary_permissions(&mut self, element: &Element) {
        for child in element.get_children() {
            if let Node::Element(child) = child {
                if let "uses-permission" | "uses-permission-sdk-23" = child.get_tag() {
                    if let Some(name) = binary_permission_name(child) {
                        self.add_permission(name);
                    }
                }
                self.collect_binary_permissions(child);
            }
        }
    }

    /// Loads a plain text XML manifest.
    pub fn from_text(code: &str) -> Result<Self> {
        let mut manifest = Self::default();
        let mut found_root = false;

        let mut parser = Reader::from_str(code);
        let _ = parser.trim_text(true);
        let mut buf = Vec::new();

        loop {
            match parser.read_event(&mut buf) {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name() {
                    b"manifest" => {
                        found_root = true;
                        manifest.parse_manifest_attributes(e.attributes())?;
                    }
                    b"uses-permission" | b"uses-permission-sdk-23" => {
                        manifest.parse_permission_attributes(e.attributes())?;
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => bail!(
                    "error at position {} of the manifest: {}",
                    parser.buffer_position(),
                    e
                ),
            }
            buf.clear();
        }

        if !found_root {
            bail!("no <manifest> element found");
        }
        Ok(manifest)
    }

    fn parse_manifest_attributes(&mut self, attributes: Attributes<'_>) -> Result<()> {
        for attr in attributes {
            let attr = attr?;
            let value = attr.unescaped_value()?;
            let value = str::from_utf8(&value).context("invalid UTF-8 for attribute value")?;

            match attr.key.rsplit(|b| b == &b':').next() {
                Some(b"package") => self.set_package(value),
                Some(b"versionCode") => self.set_version_code(value),
                Some(b"versionName") => self.set_version_name(value),
                _ => {}
            }
        }

        Ok(())
    }

    fn parse_permission_attributes(&mut self, attributes: Attributes<'_>) -> Result<()> {
        for attr in attributes {
            let attr = attr?;
            if let Some(b"name") = attr.key.rsplit(|b| b == &b':').next() {
                let value = attr.unescaped_value()?;
                self.add_permission(
                    str::from_utf8(&value).context("invalid UTF-8 for permission name")?,
                );
            }
        }

        Ok(())
    }

    /// Gets the application package.
    pub fn package(&self) -> &str {
        &self.package
    }

    fn set_package<S: Into<String>>(&mut self, package: S) {
        self.package = package.into();
    }

    /// Gets the human readable version, empty if not declared.
    pub fn version_name(&self) -> &str {
        &self.version_name
    }

    fn set_version_name<S: Into<String>>(&mut self, version_name: S) {
        self.version_name = version_name.into();
    }

    /// Gets the version code, if declared.
    pub fn version_code(&self) -> Option<&str> {
        self.version_code.as_deref()
    }

    fn set_version_code<S: Into<String>>(&mut self, version_code: S) {
        self.version_code = Some(version_code.into());
    }

    /// Gets the requested permissions.
    pub fn permissions(&self) -> &BTreeSet<String> {
        &self.permissions
    }

    fn add_permission<S: Into<String>>(&mut self, permission: S) {
        let permission = permission.into();
        if !permission.is_empty() {
            let _ = self.permissions.insert(permission);
        }
    }
}

/// Gets the part of an attribute name after its namespace prefix.
fn local_name(key: &str) -> &str {
    key.rsplit(':').next().unwrap_or(key)
}

/// Gets the permission name of a `<uses-permission>` element.
///
/// Resource obfuscators empty the attribute names. When the decoder cannot recover them from the
/// resource map, the only namespaced attribute left without a name is taken as the permission.
fn binary_permission_name(element: &Element) -> Option<&str> {
    let mut unnamed = None;
    for (key, value) in element.get_attributes() {
        match local_name(key) {
            "name" => return Some(value.as_str()),
            "" => unnamed = unnamed.or_else(|| Some(value.as_str())),
            _ => {}
        }
    }
    unnamed
}

/// Gets the permissions defined by the Android platform, sorted.
pub fn platform_permissions(permissions: &BTreeSet<String>) -> Vec<String> {
    permissions
        .iter()
        .filter(|p| p.starts_with(PLATFORM_PERMISSION_PREFIX))
        .cloned()
        .collect()
}
