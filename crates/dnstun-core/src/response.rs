//! Response construction helpers

use hickory_proto::op::{Header, Message, ResponseCode};

/// Build a response mirroring the request's identity with the given code.
///
/// The id, opcode, recursion-desired flag and questions are copied from
/// the request; no records are added.
pub fn response_for(request: &Message, code: ResponseCode) -> Message {
    let mut response = Message::new();
    response.set_header(Header::response_from_request(request.header()));
    response.add_queries(request.queries().iter().cloned());
    response.set_response_code(code);
    response
}

/// Build a REFUSED response for the request
pub fn refused(request: &Message) -> Message {
    response_for(request, ResponseCode::Refused)
}
