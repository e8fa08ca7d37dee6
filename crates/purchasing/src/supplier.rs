use serde::{Deserialize, Serialize};

use gestor_core::{ensure_not_blank, DomainError, DomainResult, Entity};

use crate::rut::Rut;

gestor_core::aggregate_id!(
    /// Supplier (proveedor) identifier.
    SupplierId
);

/// Supplier master record. Suppliers are soft-deleted (deactivated), and only
/// while no purchase order references them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub rut: Rut,
    pub business_name: String,
    pub trade_name: Option<String>,
    pub address: String,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub payment_terms: Option<String>,
    pub credit_days: u32,
    pub active: bool,
}

/// Input for registering or updating a supplier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierData {
    pub rut: String,
    pub business_name: String,
    pub trade_name: Option<String>,
    pub address: String,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub payment_terms: Option<String>,
    pub credit_days: u32,
}

impl Supplier {
    pub fn register(data: SupplierData) -> DomainResult<Self> {
        let mut supplier = Self {
            id: SupplierId::generate(),
            rut: Rut::parse(&data.rut)?,
            business_name: String::new(),
            trade_name: None,
            address: String::new(),
            city: None,
            phone: None,
            email: None,
            payment_terms: None,
            credit_days: 0,
            active: true,
        };
        supplier.update(data)?;
        Ok(supplier)
    }

    /// Replace the editable fields; the RUT is re-validated.
    pub fn update(&mut self, data: SupplierData) -> DomainResult<()> {
        ensure_not_blank("razon_social", &data.business_name)?;
        ensure_not_blank("direccion", &data.address)?;
        if let Some(email) = data.email.as_deref() {
            if !email.trim().is_empty() && !email.contains('@') {
                return Err(DomainError::validation("email: invalid e-mail address"));
            }
        }

        self.rut = Rut::parse(&data.rut)?;
        self.business_name = data.business_name.trim().to_string();
        self.trade_name = data.trade_name.filter(|v| !v.trim().is_empty());
        self.address = data.address.trim().to_string();
        self.city = data.city;
        self.phone = data.phone;
        self.email = data.email.filter(|v| !v.trim().is_empty());
        self.payment_terms = data.payment_terms;
        self.credit_days = data.credit_days;
        Ok(())
    }
}

impl Entity for Supplier {
    type Id = SupplierId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> SupplierData {
        SupplierData {
            rut: "76086428-5".into(),
            business_name: "Comercial Andes Ltda.".into(),
            address: "Av. Libertador 1234".into(),
            ..Default::default()
        }
    }

    #[test]
    fn register_formats_rut() {
        let supplier = Supplier::register(data()).unwrap();
        assert_eq!(supplier.rut.to_string(), "76.086.428-5");
        assert!(supplier.active);
    }

    #[test]
    fn register_rejects_invalid_rut_and_blank_name() {
        let mut bad = data();
        bad.rut = "76086428-1".into();
        assert!(Supplier::register(bad).is_err());

        let mut blank = data();
        blank.business_name = " ".into();
        assert!(Supplier::register(blank).is_err());
    }
}
