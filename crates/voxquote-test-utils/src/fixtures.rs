// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook bodies shaped like real vendor deliveries. Every fixture
//! describes a completed call with a transcript and extracted quote data.

use serde_json::json;

/// Bland AI post-call webhook: two minutes long, two transcript lines.
pub fn bland_completed_body() -> String {
    json!({
        "call_id": "bland-call-1",
        "to": "+14155550123",
        "from": "+14155550100",
        "status": "completed",
        "completed": true,
        "answered_by": "human",
        "started_at": "2026-03-02T15:00:00Z",
        "end_at": "2026-03-02T15:02:00Z",
        "call_length": 2.0,
        "concatenated_transcript": "assistant: Hi, this is Acme Renovations. How can I help?\nuser: I'd like a quote for a kitchen remodel.",
        "transcripts": [
            {"id": 1, "user": "assistant", "text": "Hi, this is Acme Renovations. How can I help?", "created_at": "2026-03-02T15:00:01Z"},
            {"id": 2, "user": "user", "text": "I'd like a quote for a kitchen remodel.", "created_at": "2026-03-02T15:00:06Z"}
        ],
        "recording_url": "https://recordings.bland.ai/bland-call-1.mp3",
        "summary": "Caller wants a kitchen remodel quote.",
        "disposition_tag": "quote_requested",
        "analysis": {
            "project_type": "kitchen remodel",
            "timeline": "this summer",
            "budget": "$40k",
            "caller_name": "Fox Mulder"
        },
        "variables": {"campaign": "spring"}
    })
    .to_string()
}

/// Vapi `end-of-call-report`: 95 seconds, customer "Dana Scully".
pub fn vapi_end_of_call_body() -> String {
    json!({
        "message": {
            "type": "end-of-call-report",
            "endedReason": "customer-ended-call",
            "call": {
                "id": "vapi-call-1",
                "type": "inboundPhoneCall",
                "metadata": {"crm_lead": "L-77"}
            },
            "customer": {"number": "+14155550123", "name": "Dana Scully"},
            "phoneNumber": {"number": "+14155550100"},
            "startedAt": "2026-03-02T15:00:00.000Z",
            "endedAt": "2026-03-02T15:01:35.000Z",
            "transcript": "AI: Thanks for calling. What project can we help with?\nUser: I need a new deck built.",
            "messages": [
                {"role": "bot", "message": "Thanks for calling. What project can we help with?", "time": 1772463600400u64, "secondsFromStart": 0.4},
                {"role": "user", "message": "I need a new deck built.", "time": 1772463605100u64, "secondsFromStart": 5.1}
            ],
            "recordingUrl": "https://storage.vapi.ai/vapi-call-1.wav",
            "summary": "Caller wants a deck quote.",
            "analysis": {
                "summary": "Deck build, mid budget.",
                "structuredData": {
                    "projectType": "deck",
                    "budget": "$10k-$15k",
                    "contactPreference": "text"
                },
                "successEvaluation": "true"
            }
        }
    })
    .to_string()
}

/// Retell `call_analyzed` event: 200 seconds, millisecond timestamps.
pub fn retell_call_analyzed_body() -> String {
    json!({
        "event": "call_analyzed",
        "call": {
            "call_id": "retell-call-1",
            "agent_id": "agent-42",
            "call_status": "ended",
            "from_number": "+14155550123",
            "to_number": "+14155550100",
            "direction": "inbound",
            "start_timestamp": 1772463600000u64,
            "end_timestamp": 1772463800000u64,
            "duration_ms": 200000,
            "disconnection_reason": "user_hangup",
            "transcript": "Agent: Hello, how can I help?\nUser: I want two bathrooms retiled.",
            "transcript_object": [
                {"role": "agent", "content": "Hello, how can I help?", "words": [{"word": "Hello", "start": 0.5, "end": 0.9}]},
                {"role": "user", "content": "I want two bathrooms retiled.", "words": [{"word": "I", "start": 3.2, "end": 3.3}]}
            ],
            "recording_url": "https://dxc03zgurdly9.cloudfront.net/retell-call-1.wav",
            "call_analysis": {
                "call_summary": "Wants two bathrooms retiled.",
                "user_sentiment": "Positive",
                "call_successful": true,
                "in_voicemail": false,
                "custom_analysis_data": {
                    "project_type": "bathroom tiling",
                    "timeline": "next month"
                }
            },
            "metadata": {"source": "website"}
        }
    })
    .to_string()
}

/// Near-canonical body from an in-house agent, Unix-second timestamps.
pub fn custom_completed_body() -> String {
    json!({
        "call_id": "custom-call-1",
        "status": "completed",
        "to_number": "+14155550123",
        "from_number": "+14155550100",
        "caller_name": "Walter Skinner",
        "started_at": 1772463600,
        "ended_at": 1772463690,
        "transcript": "agent: What can we quote for you?\ncaller: A new roof.",
        "transcript_entries": [
            {"role": "agent", "text": "What can we quote for you?", "offset_secs": 0.0},
            {"role": "caller", "text": "A new roof.", "offset_secs": 2.5}
        ],
        "extracted": {
            "project_type": "roofing",
            "requirements": "asphalt shingles",
            "timeline": "before winter"
        },
        "recording_url": "https://agent.example.com/recordings/custom-call-1.ogg",
        "summary": "Roof replacement quote.",
        "disposition": "qualified",
        "metadata": {"agent_version": "1.4.2"}
    })
    .to_string()
}
