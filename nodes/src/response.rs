//! Interpreting `generateContent` responses for image nodes.

use banana_core::{
    BananaError, BananaResult, Candidate, FinishReason, GenerateContentResponse, GroundingMetadata,
};

use crate::session::InlineImage;

/// What an image node needs from a successful response
#[derive(Debug, Clone)]
pub struct ImageResponse {
    pub image: InlineImage,
    pub text: String,
    pub grounding: Option<GroundingMetadata>,
}

/// Fails unless the first candidate finished with `STOP` and carries an image
pub fn parse_image_response(response: &GenerateContentResponse) -> BananaResult<ImageResponse> {
    let candidate = first_candidate(response)?;

    if let Some(reason) = candidate.finish_reason {
        if reason != FinishReason::Stop {
            return Err(BananaError::UpstreamError(format!(
                "Generation failed with reason: {}",
                reason
            )));
        }
    }

    let blob = candidate.first_inline_data().ok_or_else(|| {
        BananaError::UpstreamError("No image data found in the API response.".to_string())
    })?;

    Ok(ImageResponse {
        image: InlineImage::new(blob.mime_type.clone(), blob.decode()?),
        text: candidate.text(),
        grounding: candidate.grounding_metadata.clone(),
    })
}

fn first_candidate(response: &GenerateContentResponse) -> BananaResult<&Candidate> {
    response.first_candidate().ok_or_else(|| {
        let blocked = response
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref());
        match blocked {
            Some(reason) => BananaError::UpstreamError(format!(
                "API returned no candidates (prompt blocked: {}).",
                reason
            )),
            None => BananaError::UpstreamError("API returned no candidates.".to_string()),
        }
    })
}

/// Finish reason and safety ratings, one per line
pub fn response_metadata(response: &GenerateContentResponse) -> String {
    let Some(candidate) = response.first_candidate() else {
        return "No metadata available".to_string();
    };

    let reason = candidate
        .finish_reason
        .map(|r| r.to_string())
        .unwrap_or_else(|| "UNSPECIFIED".to_string());
    let mut metadata = format!("Finish Reason: {}", reason);

    if !candidate.safety_ratings.is_empty() {
        let ratings: Vec<String> = candidate
            .safety_ratings
            .iter()
            .map(|rating| {
                format!(
                    "{}: {}",
                    rating.category,
                    rating.probability.as_deref().unwrap_or("UNKNOWN")
                )
            })
            .collect();
        metadata.push_str(&format!("\nSafety Ratings: {}", ratings.join(", ")));
    }

    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(body: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_image_and_text_extracted() {
        let parsed = parse_image_response(&response(json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "Here is "},
                    {"inlineData": {"mimeType": "image/png", "data": "AQID"}},
                    {"inlineData": {"mimeType": "image/png", "data": "BAUG"}},
                    {"text": "your dish."}
                ]},
                "finishReason": "STOP"
            }]
        })))
        .unwrap();

        assert_eq!(parsed.image.bytes, vec![1, 2, 3]);
        assert_eq!(parsed.image.mime_type, "image/png");
        assert_eq!(parsed.text, "Here is your dish.");
        assert!(parsed.grounding.is_none());
    }

    #[test]
    fn test_no_candidates() {
        let err = parse_image_response(&response(json!({"candidates": []}))).unwrap_err();
        assert_eq!(err.to_string(), "Upstream Error: API returned no candidates.");

        let err = parse_image_response(&response(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        })))
        .unwrap_err();
        assert!(err.to_string().contains("prompt blocked: SAFETY"));
    }

    #[test]
    fn test_non_stop_finish_reason() {
        let err = parse_image_response(&response(json!({
            "candidates": [{"finishReason": "IMAGE_SAFETY"}]
        })))
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Upstream Error: Generation failed with reason: IMAGE_SAFETY"
        );
    }

    #[test]
    fn test_missing_image() {
        let err = parse_image_response(&response(json!({
            "candidates": [{
                "content": {"parts": [{"text": "I can't draw that"}]},
                "finishReason": "STOP"
            }]
        })))
        .unwrap_err();
        assert!(matches!(err, BananaError::UpstreamError(_)));
    }

    #[test]
    fn test_metadata() {
        let body = response(json!({
            "candidates": [{
                "finishReason": "STOP",
                "safetyRatings": [
                    {"category": "HARM_CATEGORY_HATE_SPEECH", "probability": "NEGLIGIBLE"},
                    {"category": "HARM_CATEGORY_HARASSMENT", "probability": "LOW"}
                ]
            }]
        }));
        assert_eq!(
            response_metadata(&body),
            "Finish Reason: STOP\nSafety Ratings: HARM_CATEGORY_HATE_SPEECH: NEGLIGIBLE, HARM_CATEGORY_HARASSMENT: LOW"
        );
        assert_eq!(
            response_metadata(&GenerateContentResponse::default()),
            "No metadata available"
        );
    }
}
