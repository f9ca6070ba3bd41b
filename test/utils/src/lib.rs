use serde_json::json;

/// A single `data: ` record carrying `text` as the content delta.
pub fn sse_chunk(text: &str) -> String {
    let record = json!({
        "choices": [{
            "delta": { "content": text },
            "finish_reason": null
        }]
    });

    return format!("data: {record}\n");
}

/// A full streamed response body, terminated by the end sentinel.
pub fn sse_body(chunks: &[&str]) -> String {
    let mut body = chunks
        .iter()
        .map(|chunk| return sse_chunk(chunk))
        .collect::<Vec<String>>()
        .join("\n");

    body += "\ndata: [DONE]\n";

    return body;
}
