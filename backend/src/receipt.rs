use crate::catalog::{Catalog, UnknownProduct};
use shared::LineItem;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub items: Vec<LineItem>,
    pub total: u32,
}

/// Groups raw detections into receipt rows. Grouping is by display name,
/// not class id, and rows are emitted in first-seen order; both are part of
/// the response contract. Fails atomically on the first unknown id.
///
/// Pure on purpose: all pricing and quantity arithmetic lives here and
/// nowhere else, so it can be tested against literal detection sequences.
pub fn aggregate(class_ids: &[i64], catalog: &Catalog) -> Result<Receipt, UnknownProduct> {
    // Name -> slot index, with the slots themselves keeping insertion order.
    let mut slots: Vec<(String, u32, u32)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for &class_id in class_ids {
        let entry = catalog.lookup(class_id)?;
        match index.get(entry.name.as_str()) {
            Some(&slot) => slots[slot].1 += 1,
            None => {
                index.insert(entry.name.clone(), slots.len());
                // Two ids sharing a name keep the first-encountered price.
                slots.push((entry.name.clone(), 1, entry.price));
            }
        }
    }

    let mut total = 0;
    let items = slots
        .into_iter()
        .map(|(product, quantity, price)| {
            let subtotal = quantity * price;
            total += subtotal;
            LineItem {
                product,
                quantity,
                price,
                subtotal,
            }
        })
        .collect();

    Ok(Receipt { items, total })
}
