//! Auto-setup scanner for IHC project documents.
//!
//! The project document describes the installation as groups (rooms, zones)
//! containing products. Every product matching a catalog rule yields one
//! discovered device, named after its group.

use std::num::ParseIntError;

use serde::Serialize;

use super::catalog::ProductRule;
use super::controller::IhcId;

/// Descriptive attributes of the product a device was discovered from.
///
/// Empty for manually configured devices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProductInfo {
    pub name: String,
    pub note: String,
    pub position: String,
}

/// A device found in the project document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice<K> {
    pub ihcid: IhcId,

    /// `<group name>_<ihcid>`
    pub name: String,

    /// Platform data copied from the matching rule
    pub kind: K,

    pub product: ProductInfo,
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Project document is not valid XML: {0}")]
    MalformedProject(#[from] roxmltree::Error),

    #[error("<{element}> element is missing the '{attribute}' attribute")]
    MissingAttribute {
        element: String,
        attribute: &'static str,
    },

    #[error("Product {product_identifier} in group '{group}' has no <{value_node}> node")]
    MissingResource {
        group: String,
        product_identifier: &'static str,
        value_node: &'static str,
    },

    #[error("Invalid resource id '{id}': {source}")]
    InvalidId {
        id: String,
        #[source]
        source: ParseIntError,
    },
}

/// Parse a controller id as written in project documents and configuration.
///
/// Ids are encoded as `_` followed by a decimal or `0x`-prefixed hex literal,
/// e.g. `_0x2a` or `_42`. The separator is optional.
pub fn parse_ihc_id(raw: &str) -> Result<IhcId, ParseIntError> {
    let literal = raw.trim().trim_matches('_');
    match literal
        .strip_prefix("0x")
        .or_else(|| literal.strip_prefix("0X"))
    {
        Some(hex) => IhcId::from_str_radix(hex, 16),
        None => literal.parse(),
    }
}

/// A parsed project document
pub struct ProjectDocument<'input> {
    doc: roxmltree::Document<'input>,
}

impl<'input> ProjectDocument<'input> {
    pub fn parse(xml: &'input str) -> Result<Self, ScanError> {
        Ok(Self {
            doc: roxmltree::Document::parse(xml)?,
        })
    }

    /// Discover every device `catalog` describes.
    ///
    /// Groups are visited in document order, rules in catalog order and
    /// products in document order. A product is only reported for the first
    /// rule that matches it. The iterator is lazy; calling `discover` again
    /// restarts the scan.
    pub fn discover<'a, K: Clone + 'a>(
        &'a self,
        catalog: &'a [ProductRule<K>],
    ) -> Box<dyn Iterator<Item = Result<DiscoveredDevice<K>, ScanError>> + 'a> {
        let groups = self
            .doc
            .descendants()
            .filter(|node| node.has_tag_name("group"));

        Box::new(groups.flat_map(move |group| {
            catalog.iter().enumerate().flat_map(move |(index, rule)| {
                group
                    .descendants()
                    .filter(move |product| first_match(catalog, *product) == Some(index))
                    .map(move |product| discover_product(group, rule, product))
            })
        }))
    }
}

/// Parse `xml` and collect every discovered device, failing on the first error
pub fn scan<K: Clone>(
    xml: &str,
    catalog: &[ProductRule<K>],
) -> Result<Vec<DiscoveredDevice<K>>, ScanError> {
    let project = ProjectDocument::parse(xml)?;
    let devices = project.discover(catalog).collect();
    devices
}

fn first_match<K>(catalog: &[ProductRule<K>], product: roxmltree::Node<'_, '_>) -> Option<usize> {
    catalog.iter().position(|rule| rule.matches(product))
}

fn discover_product<K: Clone>(
    group: roxmltree::Node<'_, '_>,
    rule: &ProductRule<K>,
    product: roxmltree::Node<'_, '_>,
) -> Result<DiscoveredDevice<K>, ScanError> {
    let group_name = group
        .attribute("name")
        .ok_or_else(|| ScanError::MissingAttribute {
            element: "group".to_string(),
            attribute: "name",
        })?;

    let node = product
        .children()
        .find(|child| child.has_tag_name(rule.value_node))
        .ok_or_else(|| ScanError::MissingResource {
            group: group_name.to_string(),
            product_identifier: rule.product_identifier,
            value_node: rule.value_node,
        })?;

    let raw_id = node
        .attribute("id")
        .ok_or_else(|| ScanError::MissingAttribute {
            element: rule.value_node.to_string(),
            attribute: "id",
        })?;

    let ihcid = parse_ihc_id(raw_id).map_err(|source| ScanError::InvalidId {
        id: raw_id.to_string(),
        source,
    })?;

    let attr = |name: &str| product.attribute(name).unwrap_or_default().to_string();

    Ok(DiscoveredDevice {
        ihcid,
        name: format!("{}_{}", group_name, ihcid),
        kind: rule.kind.clone(),
        product: ProductInfo {
            name: attr("name"),
            note: attr("note"),
            position: attr("position"),
        },
    })
}
