//! Search-as-you-type filtering over service orders.

use cremation_types::ServiceOrder;

/// Returns true if the folio, pet name or owner name contains `needle`.
///
/// `needle` must already be lowercased.
fn matches(order: &ServiceOrder, needle: &str) -> bool {
	[&order.folio, &order.pet.name, &order.owner.name]
		.into_iter()
		.any(|field| field.to_lowercase().contains(needle))
}

/// Keeps the orders matching `query` case-insensitively.
///
/// An empty or whitespace-only query keeps everything. Input order is
/// preserved.
pub fn filter(orders: Vec<ServiceOrder>, query: &str) -> Vec<ServiceOrder> {
	let needle = query.trim().to_lowercase();
	if needle.is_empty() {
		return orders;
	}
	orders
		.into_iter()
		.filter(|order| matches(order, &needle))
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use cremation_types::{OrderStatus, OwnerRef, PetRef, ServiceType};

	fn order(folio: &str, pet: &str, owner: &str) -> ServiceOrder {
		ServiceOrder {
			id: folio.to_lowercase(),
			folio: folio.to_string(),
			status: OrderStatus::InTransit,
			service_type: ServiceType::Immediate,
			pet: PetRef {
				id: format!("pet-{}", pet),
				name: pet.to_string(),
			},
			owner: OwnerRef {
				id: format!("owner-{}", owner),
				name: owner.to_string(),
			},
			branch_id: None,
			created_at: 0,
			updated_at: 0,
		}
	}

	fn sample() -> Vec<ServiceOrder> {
		vec![
			order("CRM-0001", "Max", "Ana López"),
			order("CRM-0002", "Luna", "Maximiliano Ruiz"),
			order("CRM-0003", "Toby", "Carla Díaz"),
			order("MAX-0004", "Nala", "Pedro Soto"),
		]
	}

	fn folios(orders: &[ServiceOrder]) -> Vec<&str> {
		orders.iter().map(|o| o.folio.as_str()).collect()
	}

	#[test]
	fn test_matches_any_field_case_insensitively() {
		let kept = filter(sample(), "max");
		assert_eq!(folios(&kept), vec!["CRM-0001", "CRM-0002", "MAX-0004"]);
	}

	#[test]
	fn test_empty_query_keeps_everything() {
		assert_eq!(filter(sample(), "").len(), 4);
		assert_eq!(filter(sample(), "   ").len(), 4);
	}

	#[test]
	fn test_query_is_trimmed() {
		let kept = filter(sample(), "  TOBY ");
		assert_eq!(folios(&kept), vec!["CRM-0003"]);
	}

	#[test]
	fn test_no_match() {
		assert!(filter(sample(), "zzz").is_empty());
	}

	#[test]
	fn test_accented_names() {
		let kept = filter(sample(), "DÍAZ");
		assert_eq!(folios(&kept), vec!["CRM-0003"]);
	}
}
