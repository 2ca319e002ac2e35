/// Number of lots to trade in one deal
///
/// # Arguments
/// * `max_deal_sum` - Ceiling on the value of one deal
/// * `price` - Limit price per piece
/// * `lot` - Pieces per lot
/// * `operation_lots` - Preferred lot count when the ceiling allows it
///
/// # Returns
/// `operation_lots` when the full deal fits strictly under the ceiling,
/// otherwise the largest whole lot count that does. May be 0.
pub fn calc_lot_count(max_deal_sum: f64, price: f64, lot: i64, operation_lots: i64) -> i64 {
    let full_deal = price * (operation_lots * lot) as f64;
    if max_deal_sum > full_deal {
        return operation_lots;
    }

    let lot_cost = lot as f64 * price;
    if lot_cost <= 0.0 {
        return 0;
    }
    (max_deal_sum / lot_cost).floor() as i64
}
