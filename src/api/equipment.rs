//! Equipment id resolution endpoint.

use axum::extract::Query;

use super::{success, ApiResult};
use crate::equipment::resolve_equipment_id;
use crate::models::{EquipmentIdResponse, EquipmentQuery};

/// GET /api/equipment/resolve - Default equipment id from `url` or `qr` parameters.
pub async fn resolve_equipment(
    Query(query): Query<EquipmentQuery>,
) -> ApiResult<EquipmentIdResponse> {
    success(EquipmentIdResponse {
        equipment_id: resolve_equipment_id(query.url.as_deref(), query.qr.as_deref()),
    })
}
