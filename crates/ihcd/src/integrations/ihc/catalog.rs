//! Products auto-setup knows how to map to devices.
//!
//! A rule matches a product element (`element`) below a group whose
//! `product_identifier` attribute equals `product_identifier`. The resource id
//! is read from the child node named `value_node`.

use super::binary_sensor::BinarySensorDeviceClass;

/// One entry of a product catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRule<K> {
    /// Product element name, `product_dataline` or `product_airlink`
    pub element: &'static str,

    /// Value of the `product_identifier` attribute, e.g. `_0x2109`
    pub product_identifier: &'static str,

    /// Child node carrying the resource `id` attribute
    pub value_node: &'static str,

    /// Human-readable product description
    pub description: &'static str,

    /// Platform specific data attached to every device this rule discovers
    pub kind: K,
}

impl<K> ProductRule<K> {
    /// Whether `product` is an element this rule describes
    pub fn matches(&self, product: roxmltree::Node<'_, '_>) -> bool {
        product.is_element()
            && product.tag_name().name() == self.element
            && product.attribute("product_identifier") == Some(self.product_identifier)
    }
}

/// Binary sensor specific rule data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorRule {
    pub device_class: BinarySensorDeviceClass,

    /// The input reports the opposite of the sensor state (e.g. magnet contacts)
    pub inverted: bool,
}

const fn dataline_sensor(
    product_identifier: &'static str,
    description: &'static str,
    device_class: BinarySensorDeviceClass,
    inverted: bool,
) -> ProductRule<SensorRule> {
    ProductRule {
        element: "product_dataline",
        product_identifier,
        value_node: "dataline_input",
        description,
        kind: SensorRule {
            device_class,
            inverted,
        },
    }
}

pub static BINARY_SENSOR_PRODUCTS: &[ProductRule<SensorRule>] = &[
    dataline_sensor(
        "_0x2109",
        "Magnet contact",
        BinarySensorDeviceClass::Opening,
        true,
    ),
    dataline_sensor("_0x210e", "PIR sensor", BinarySensorDeviceClass::Motion, false),
    dataline_sensor(
        "_0x0",
        "PIR sensor twilight",
        BinarySensorDeviceClass::Motion,
        false,
    ),
    dataline_sensor(
        "_0x210f",
        "PIR sensor alarm",
        BinarySensorDeviceClass::Motion,
        false,
    ),
    dataline_sensor(
        "_0x210a",
        "Smoke detector",
        BinarySensorDeviceClass::Smoke,
        false,
    ),
    dataline_sensor(
        "_0x210c",
        "Leak detector",
        BinarySensorDeviceClass::Moisture,
        false,
    ),
    dataline_sensor(
        "_0x2110",
        "Light detector",
        BinarySensorDeviceClass::Light,
        false,
    ),
];

pub static LIGHT_PRODUCTS: &[ProductRule<()>] = &[
    ProductRule {
        element: "product_airlink",
        product_identifier: "_0x4406",
        value_node: "airlink_dimming",
        description: "Wireless combi dimmer 4 buttons",
        kind: (),
    },
    ProductRule {
        element: "product_airlink",
        product_identifier: "_0x4306",
        value_node: "airlink_dimming",
        description: "Wireless lamp outlet dimmer",
        kind: (),
    },
    ProductRule {
        element: "product_airlink",
        product_identifier: "_0x4202",
        value_node: "airlink_relay",
        description: "Wireless lamp outlet relay",
        kind: (),
    },
    ProductRule {
        element: "product_airlink",
        product_identifier: "_0x4404",
        value_node: "airlink_relay",
        description: "Wireless combi relay 4 buttons",
        kind: (),
    },
    ProductRule {
        element: "product_dataline",
        product_identifier: "_0x2202",
        value_node: "dataline_output",
        description: "Dataline lamp outlet",
        kind: (),
    },
];
