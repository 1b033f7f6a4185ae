//! Listing payloads served by the mock API

use serde_json::{Value, json};

/// Listing response body
pub fn listing(totals: u64, data: Vec<Value>) -> Value {
    json!({
        "paging": {"is_end": true, "totals": totals},
        "data": data
    })
}

/// Answer whose body embeds one image
pub fn answer_with_image(id: u64, title: &str, image_url: &str) -> Value {
    json!({
        "created": 1700000000,
        "content": {
            "type": "answer",
            "id": id,
            "url": format!("https://www.zhihu.com/question/9/answer/{id}"),
            "question": {"title": title},
            "content": format!("<p>Look at this</p><img src=\"{image_url}\">"),
            "author": {"name": "Ferris", "headline": "Crab"},
            "created_time": 1700000000,
            "updated_time": 1700000600,
            "voteup_count": 3,
            "comment_count": 1
        }
    })
}

/// Note made of a text block and an image block
pub fn pin_with_image(id: u64, text: &str, image_url: &str) -> Value {
    json!({
        "created": 1700000000,
        "content": {
            "type": "pin",
            "id": id,
            "content": [
                {"type": "text", "content": text},
                {"type": "image", "url": image_url}
            ],
            "created": 1700000000
        }
    })
}
