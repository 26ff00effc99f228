//! Shipping fee calculation and per-item province shippability.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::aggregates::Product;
use crate::domain::value_objects::{Province, Weight};

/// Provinces and centrally-run cities a parcel can be addressed to.
pub const PROVINCES: [&str; 63] = [
    "An Giang", "Bà Rịa - Vũng Tàu", "Bắc Giang", "Bắc Kạn", "Bạc Liêu", "Bắc Ninh",
    "Bến Tre", "Bình Định", "Bình Dương", "Bình Phước", "Bình Thuận", "Cà Mau",
    "Cần Thơ", "Cao Bằng", "Đà Nẵng", "Đắk Lắk", "Đắk Nông", "Điện Biên",
    "Đồng Nai", "Đồng Tháp", "Gia Lai", "Hà Giang", "Hà Nam", "Hà Nội",
    "Hà Tĩnh", "Hải Dương", "Hải Phòng", "Hậu Giang", "Hòa Bình", "Hưng Yên",
    "Khánh Hòa", "Kiên Giang", "Kon Tum", "Lai Châu", "Lâm Đồng", "Lạng Sơn",
    "Lào Cai", "Long An", "Nam Định", "Nghệ An", "Ninh Bình", "Ninh Thuận",
    "Phú Thọ", "Phú Yên", "Quảng Bình", "Quảng Nam", "Quảng Ngãi", "Quảng Ninh",
    "Quảng Trị", "Sóc Trăng", "Sơn La", "Tây Ninh", "Thái Bình", "Thái Nguyên",
    "Thanh Hóa", "Thừa Thiên Huế", "Tiền Giang", "Hồ Chí Minh", "Trà Vinh",
    "Tuyên Quang", "Vĩnh Long", "Vĩnh Phúc", "Yên Bái",
];

pub fn is_known_province(name: &str) -> bool {
    let wanted = Province::new(name);
    PROVINCES.iter().any(|p| Province::new(p) == wanted)
}

/// Fee schedule. Amounts are in whole currency units.
#[derive(Clone, Debug, PartialEq)]
pub struct ShippingRates {
    pub home_province: String,
    pub home_fee: Decimal,
    pub base_fee: Decimal,
    pub low_weight_kg: Decimal,
    pub per_kg_fee: Decimal,
}

impl Default for ShippingRates {
    fn default() -> Self {
        Self {
            home_province: "Đà Nẵng".to_string(),
            home_fee: Decimal::from(30_000),
            base_fee: Decimal::from(35_000),
            low_weight_kg: Decimal::from(5),
            per_kg_fee: Decimal::from(7_000),
        }
    }
}

impl ShippingRates {
    pub fn is_home(&self, destination: &str) -> bool {
        Province::new(destination) == Province::new(&self.home_province)
    }

    /// Flat fee inside the home province. Elsewhere, a base fee up to the
    /// low-weight threshold, then whole kilograms (rounded up) times the
    /// per-kg rate. Unknown destinations price as interprovincial.
    pub fn compute_shipping(&self, total_weight: Weight, destination: &str) -> Decimal {
        if self.is_home(destination) {
            return self.home_fee;
        }
        let kg = total_weight.value();
        if kg <= self.low_weight_kg {
            return self.base_fee;
        }
        kg.ceil() * self.per_kg_fee
    }

    pub fn can_ship(&self, item: &Product, destination: &str) -> bool {
        self.is_home(destination) || item.interprovince.is_set()
    }
}

/// Fee breakdown for a cart headed to one province.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingQuote {
    pub province: String,
    pub interprovincial: bool,
    /// False when the destination is not in [`PROVINCES`]; it is still priced.
    pub known_province: bool,
    pub total_weight_kg: Decimal,
    pub fee: Decimal,
    /// Product ids that cannot be sent to `province`.
    pub unshippable: Vec<String>,
}

impl ShippingQuote {
    pub fn is_deliverable(&self) -> bool { self.unshippable.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::ShippableFlag;

    fn kg(raw: &str) -> Weight { Weight::parse(raw) }

    fn product(flag: ShippableFlag) -> Product {
        Product {
            id: "P1".into(),
            name: "Tea".into(),
            price: Decimal::from(100_000),
            promo_price: None,
            import_price: Decimal::from(50_000),
            weight: Weight::kg(Decimal::ONE),
            interprovince: flag,
            sold: 0,
        }
    }

    #[test]
    fn test_light_parcels_pay_base_fee() {
        let rates = ShippingRates::default();
        for w in ["0", "0,4", "1", "4.99", "5"] {
            assert_eq!(rates.compute_shipping(kg(w), "Hà Nội"), Decimal::from(35_000));
        }
    }

    #[test]
    fn test_heavy_parcels_round_weight_up() {
        let rates = ShippingRates::default();
        assert_eq!(rates.compute_shipping(kg("5.01"), "Hà Nội"), Decimal::from(6 * 7_000));
        assert_eq!(rates.compute_shipping(kg("6"), "Huế"), Decimal::from(6 * 7_000));
        assert_eq!(rates.compute_shipping(kg("12,3"), "Cà Mau"), Decimal::from(13 * 7_000));
    }

    #[test]
    fn test_summed_weights_stay_exact_at_the_tiers() {
        let rates = ShippingRates::default();
        let five = kg("1,6").times(3) + kg("0,2");
        assert_eq!(rates.compute_shipping(five, "Hà Nội"), Decimal::from(35_000));
        let six = kg("0,1").times(60);
        assert_eq!(rates.compute_shipping(six, "Hà Nội"), Decimal::from(6 * 7_000));
    }

    #[test]
    fn test_home_province_is_flat() {
        let rates = ShippingRates::default();
        for w in ["0", "3", "5,5", "40"] {
            assert_eq!(rates.compute_shipping(kg(w), "Đà Nẵng"), Decimal::from(30_000));
        }
        assert_eq!(rates.compute_shipping(kg("40"), " tp. đà nẵng "), Decimal::from(30_000));
    }

    #[test]
    fn test_unknown_province_prices_as_interprovincial() {
        let rates = ShippingRates::default();
        assert!(!is_known_province("Atlantis"));
        assert_eq!(rates.compute_shipping(kg("2"), "Atlantis"), Decimal::from(35_000));
        assert_eq!(rates.compute_shipping(kg("7.2"), ""), Decimal::from(8 * 7_000));
    }

    #[test]
    fn test_can_ship() {
        let rates = ShippingRates::default();
        assert!(rates.can_ship(&product(ShippableFlag::NO), "Đà Nẵng"));
        assert!(!rates.can_ship(&product(ShippableFlag::NO), "Hà Nội"));
        assert!(rates.can_ship(&product(ShippableFlag::YES), "Hà Nội"));
    }

    #[test]
    fn test_province_list() {
        assert!(is_known_province("hà nội"));
        assert!(is_known_province("Thành phố Hồ Chí Minh"));
    }
}
