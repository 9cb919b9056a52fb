//! Helper for wrapping a typed protobuf message as a `google.protobuf.Any`,
//! the shape every xDS resource (and every `typed_config` extension point)
//! is transmitted as.

use envoy_types::pb::google::protobuf::Any;
use prost::Message;

pub fn pack_any(type_url: impl Into<String>, msg: &impl Message) -> Any {
	Any { type_url: type_url.into(), value: msg.encode_to_vec() }
}
