//! Display formatting for wallet amounts

use crate::record::Amount;

/// Coin balance, e.g. `150 FC`
pub fn balance_text(balance: Amount) -> String {
    format!("{} FC", balance)
}

/// Coin balance with the coin icon, as shown on the dashboard
pub fn balance_markup(balance: Amount) -> String {
    format!(
        "<i class=\"fas fa-coins text-warning\"></i> {}",
        balance_text(balance)
    )
}

/// Monthly revenue in pesos with two decimals, e.g. `$320.00 MXN`
pub fn revenue_text(revenue: Amount) -> String {
    match revenue {
        Amount::Integer(i) => format!("${}.00 MXN", i),
        Amount::Decimal(d) => format!("${:.2} MXN", d),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_formatting() {
        assert_eq!(balance_text(Amount::Integer(150)), "150 FC");
        assert_eq!(balance_text(Amount::ZERO), "0 FC");
        assert_eq!(balance_text(Amount::Decimal(12.5)), "12.5 FC");
        assert_eq!(
            balance_markup(Amount::Integer(150)),
            "<i class=\"fas fa-coins text-warning\"></i> 150 FC"
        );
    }

    #[test]
    fn test_revenue_formatting() {
        assert_eq!(revenue_text(Amount::Integer(320)), "$320.00 MXN");
        assert_eq!(revenue_text(Amount::ZERO), "$0.00 MXN");
        assert_eq!(revenue_text(Amount::Decimal(12.5)), "$12.50 MXN");
        assert_eq!(revenue_text(Amount::Decimal(99.999)), "$100.00 MXN");
        assert_eq!(revenue_text(Amount::Integer(-40)), "$-40.00 MXN");
    }
}
