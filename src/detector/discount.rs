/// Price minus point rebate — the cost basis every comparison uses.
pub fn effective_price(current_price: f64, point_value: f64) -> f64 {
    current_price - point_value
}

/// Discount percentage relative to list price, points included.
/// Missing prices mean no sale (0.0), never an error. Negative results are
/// valid — they signal a listing that costs more than list after points.
pub fn discount_percentage(
    current_price: Option<f64>,
    list_price: Option<f64>,
    point_value: f64,
) -> f64 {
    let (Some(current), Some(list)) = (current_price, list_price) else {
        return 0.0;
    };
    if list <= 0.0 {
        return 0.0;
    }
    let discount = list - effective_price(current, point_value);
    (discount / list) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_prices_mean_no_discount() {
        assert_eq!(discount_percentage(None, Some(1000.0), 0.0), 0.0);
        assert_eq!(discount_percentage(Some(750.0), None, 0.0), 0.0);
        assert_eq!(discount_percentage(None, None, 50.0), 0.0);
    }

    #[test]
    fn zero_or_negative_list_price_never_divides() {
        assert_eq!(discount_percentage(Some(500.0), Some(0.0), 0.0), 0.0);
        assert_eq!(discount_percentage(Some(500.0), Some(-1.0), 0.0), 0.0);
    }

    #[test]
    fn quarter_off_without_points() {
        let pct = discount_percentage(Some(750.0), Some(1000.0), 0.0);
        assert!((pct - 25.0).abs() < 1e-9);
    }

    #[test]
    fn points_deepen_the_discount() {
        // 1000 list, 900 current, 100 points → effective 800 → 20% off
        let pct = discount_percentage(Some(900.0), Some(1000.0), 100.0);
        assert!((pct - 20.0).abs() < 1e-9);
    }

    #[test]
    fn negative_discount_is_valid() {
        let pct = discount_percentage(Some(1200.0), Some(1000.0), 0.0);
        assert!(pct < 0.0);
    }
}
