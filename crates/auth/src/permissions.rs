use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are opaque `app.codename` strings (e.g. "solicitudes.aprobar_solicitud").
/// The wildcard permission `"*"` grants everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

pub const ALL: Permission = Permission::from_static("*");

pub mod requisitions {
    use super::Permission;

    pub const CREATE: Permission = Permission::from_static("solicitudes.add_solicitud");
    pub const CHANGE: Permission = Permission::from_static("solicitudes.change_solicitud");
    pub const APPROVE: Permission = Permission::from_static("solicitudes.aprobar_solicitud");
    pub const REJECT: Permission = Permission::from_static("solicitudes.rechazar_solicitud");
    pub const DISPATCH: Permission = Permission::from_static("solicitudes.despachar_solicitud");
}

pub mod purchasing {
    use super::Permission;

    pub const CREATE: Permission = Permission::from_static("compras.add_ordencompra");
    pub const CHANGE: Permission = Permission::from_static("compras.change_ordencompra");
    pub const AUTHORIZE: Permission = Permission::from_static("compras.autorizar_ordencompra");
    pub const RECEIVE: Permission = Permission::from_static("compras.recibir_ordencompra");
    pub const MANAGE_SUPPLIERS: Permission = Permission::from_static("compras.change_proveedor");
}

pub mod writeoffs {
    use super::Permission;

    pub const CREATE: Permission = Permission::from_static("bajas_inventario.add_bajainventario");
    pub const CHANGE: Permission = Permission::from_static("bajas_inventario.change_bajainventario");
    pub const AUTHORIZE: Permission =
        Permission::from_static("bajas_inventario.autorizar_bajainventario");
}

pub mod warehouse {
    use super::Permission;

    pub const MANAGE_ARTICLES: Permission = Permission::from_static("bodega.change_articulo");
    pub const MOVE_STOCK: Permission = Permission::from_static("bodega.add_movimiento");
}

pub mod assets {
    use super::Permission;

    pub const MANAGE_ASSETS: Permission = Permission::from_static("activos.change_activo");
    pub const MOVE_ASSETS: Permission = Permission::from_static("activos.add_movimientoactivo");
}
