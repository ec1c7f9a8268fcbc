use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::detector::discount::effective_price;
use crate::types::{parse_timestamp, WatchedItem};

/// Further effective-price drop (relative to the last notified price) that
/// overrides the cooldown window. 0.9 = at least 10% cheaper.
const RENOTIFY_PRICE_RATIO: f64 = 0.9;

/// Decide whether a qualifying sale should actually produce a notification.
///
/// Evaluated in order:
/// 1. never notified → notify
/// 2. cooldown window elapsed → notify, price ignored
/// 3. within cooldown → notify only if the effective price dropped at least
///    10% below the last notified effective price
/// 4. unparsable stored timestamp → no reliable history, fail open and notify
///
/// `now` is injected so tests can pin the clock.
pub fn should_notify(
    previous: &WatchedItem,
    current_price: f64,
    point_value: f64,
    now: NaiveDateTime,
    cooldown_days: i64,
) -> bool {
    let Some(last_notification) = previous.last_notification.as_deref() else {
        return true;
    };

    let Some(last_notified_at) = parse_timestamp(last_notification) else {
        warn!(
            item_id = %previous.id,
            "unparsable last_notification {last_notification:?} — treating as no history",
        );
        return true;
    };

    let elapsed_days =
        now.signed_duration_since(last_notified_at).num_seconds() as f64 / 86_400.0;
    info!(
        item_id = %previous.id,
        "{elapsed_days:.1} days since last notification for \"{}\"",
        previous.description,
    );

    if elapsed_days >= cooldown_days as f64 {
        return true;
    }

    // Within cooldown: re-notify only on a substantial further drop. A missing
    // previous price means no usable comparison — notify.
    let Some(last_price) = previous.current_price else {
        return true;
    };
    let last_effective = effective_price(last_price, previous.points.unwrap_or(0.0));
    let current_effective = effective_price(current_price, point_value);

    let improvement = if last_effective > 0.0 {
        (last_effective - current_effective) / last_effective * 100.0
    } else {
        0.0
    };
    info!(
        item_id = %previous.id,
        "effective price: last={last_effective}, now={current_effective}, change={improvement:.1}%",
    );

    if current_effective >= last_effective * RENOTIFY_PRICE_RATIO {
        info!(
            item_id = %previous.id,
            "suppressing notification — only {elapsed_days:.1} days elapsed and no substantial further drop",
        );
        false
    } else {
        info!(
            item_id = %previous.id,
            "re-notifying within cooldown — effective price dropped substantially",
        );
        true
    }
}
