//! Product lookup: project an order request through the catalog.
//!
//! The catalog is read once for the distinct requested numbers; the result is then
//! re-projected through an index so that request order and multiplicity survive.

use std::collections::HashSet;

use thiserror::Error;

use cafekiosk_core::index_by_id;

use crate::product::{Product, ProductNumber};

/// A requested product number is not in the catalog.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown product: {product_number}")]
pub struct UnknownProduct {
    pub product_number: ProductNumber,
}

/// Distinct numbers of a request, in first-occurrence order.
pub fn distinct_numbers(requested: &[ProductNumber]) -> Vec<ProductNumber> {
    let mut seen = HashSet::with_capacity(requested.len());
    requested
        .iter()
        .filter(|number| seen.insert(*number))
        .cloned()
        .collect()
}

/// Resolve every requested number against the batch read from the catalog.
///
/// Output has the same length and order as `requested`; duplicates resolve to
/// repeated copies of the same product. The first number (in request order) missing
/// from `found` fails the whole lookup.
pub fn resolve_requested(
    requested: &[ProductNumber],
    found: Vec<Product>,
) -> Result<Vec<Product>, UnknownProduct> {
    let index = index_by_id(found);

    requested
        .iter()
        .map(|number| {
            index.get(number).cloned().ok_or_else(|| UnknownProduct {
                product_number: number.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::{ProductSellingStatus, ProductType};

    fn product(number: &str, product_type: ProductType, price: u32) -> Product {
        Product::new(
            ProductNumber::new(number),
            product_type,
            ProductSellingStatus::Selling,
            format!("menu {number}"),
            price,
        )
    }

    fn numbers(values: &[&str]) -> Vec<ProductNumber> {
        values.iter().map(|v| ProductNumber::new(*v)).collect()
    }

    #[test]
    fn distinct_numbers_keeps_first_occurrence_order() {
        let distinct = distinct_numbers(&numbers(&["002", "001", "002", "003", "001"]));
        assert_eq!(distinct, numbers(&["002", "001", "003"]));
    }

    #[test]
    fn resolve_preserves_order_and_duplicates() {
        let found = vec![
            product("001", ProductType::Handmade, 1000),
            product("002", ProductType::Bottle, 3000),
        ];

        let resolved = resolve_requested(&numbers(&["002", "001", "002"]), found).unwrap();

        let resolved_numbers: Vec<&str> =
            resolved.iter().map(|p| p.product_number().as_str()).collect();
        assert_eq!(resolved_numbers, vec!["002", "001", "002"]);
        assert_eq!(resolved[0], resolved[2]);
    }

    #[test]
    fn resolve_fails_on_first_unknown_in_request_order() {
        let found = vec![product("001", ProductType::Handmade, 1000)];

        let err = resolve_requested(&numbers(&["001", "009", "008"]), found).unwrap_err();
        assert_eq!(err.product_number.as_str(), "009");
    }

    #[test]
    fn resolve_of_empty_request_is_empty() {
        let resolved = resolve_requested(&[], Vec::new()).unwrap();
        assert!(resolved.is_empty());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn catalog() -> Vec<Product> {
            vec![
                product("001", ProductType::Handmade, 1000),
                product("002", ProductType::Bottle, 3000),
                product("003", ProductType::Bakery, 5000),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: for known numbers, resolution is a position-wise projection of the
            /// request.
            #[test]
            fn resolution_projects_the_request(picks in prop::collection::vec(0usize..3, 0..20)) {
                let requested: Vec<ProductNumber> = picks
                    .iter()
                    .map(|i| ProductNumber::new(format!("{:03}", i + 1)))
                    .collect();

                let resolved = resolve_requested(&requested, catalog()).unwrap();

                prop_assert_eq!(resolved.len(), requested.len());
                for (product, number) in resolved.iter().zip(requested.iter()) {
                    prop_assert_eq!(product.product_number(), number);
                }
            }
        }
    }
}
