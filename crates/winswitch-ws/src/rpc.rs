/*!
RPC request/response types and dispatch.
*/

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use ts_rs::TS;
use winswitch::{Intent, Snapshot, Switcher};

/// RPC request.
#[derive(Debug, Deserialize, TS)]
#[serde(tag = "method", content = "args", rename_all = "snake_case")]
#[ts(export)]
pub enum RpcRequest {
  /// Get the current registry, cursor and mode.
  Snapshot,
  /// Feed an input intent (cycle, begin, commit, cancel).
  Intent { intent: Intent },
  /// Rebuild from OS truth.
  Resync,
  /// Re-sort the current desktop by z-order.
  SortByLevel,
}

/// RPC response.
#[derive(Debug, Serialize, TS)]
#[serde(untagged)]
#[ts(export)]
pub enum RpcResponse {
  /// Full state snapshot.
  Snapshot(Box<Snapshot>),
  /// No data.
  Null,
}

pub fn dispatch_json(switcher: &Switcher, method: &str, args: &JsonValue) -> JsonValue {
  let request_value = json!({ "method": method, "args": args });

  match serde_json::from_value::<RpcRequest>(request_value) {
    Ok(request) => match dispatch(switcher, request) {
      Ok(response) => json!({ "result": response }),
      Err(e) => {
        log::warn!("[rpc] {method} failed: {e}");
        json!({ "error": e })
      }
    },
    Err(e) => {
      log::warn!("[rpc] Invalid request for {method}: {e}");
      json!({ "error": format!("Invalid request: {}", e) })
    }
  }
}

pub fn dispatch(switcher: &Switcher, request: RpcRequest) -> Result<RpcResponse, String> {
  match request {
    RpcRequest::Snapshot => Ok(RpcResponse::Snapshot(Box::new(switcher.snapshot()))),

    RpcRequest::Intent { intent } => {
      switcher.intent(intent).map_err(|e| e.to_string())?;
      Ok(RpcResponse::Null)
    }

    RpcRequest::Resync => {
      switcher.resync().map_err(|e| e.to_string())?;
      Ok(RpcResponse::Null)
    }

    RpcRequest::SortByLevel => {
      switcher.sort_by_level().map_err(|e| e.to_string())?;
      Ok(RpcResponse::Null)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn requests_parse_from_method_and_args() {
    let req: RpcRequest =
      serde_json::from_value(json!({ "method": "intent", "args": { "intent": "cycle_next" } }))
        .unwrap();
    assert!(matches!(
      req,
      RpcRequest::Intent {
        intent: Intent::CycleNext
      }
    ));

    let req: RpcRequest = serde_json::from_value(json!({ "method": "sort_by_level" })).unwrap();
    assert!(matches!(req, RpcRequest::SortByLevel));
  }

  #[test]
  fn null_response_serializes_as_null() {
    assert_eq!(serde_json::to_value(RpcResponse::Null).unwrap(), JsonValue::Null);
  }
}
